//! Application configuration
//!
//! Layered as: built-in defaults, then an optional JSON file named by
//! `ACCIDENT_ANALYTICS_CONFIG`, then individual environment variables.
//! Secrets may come from the file or the environment but are never
//! serialized back out.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{FallbackPolicy, OrchestratorSettings, PhysicsMethod, DEFAULT_JURISDICTION};
use crate::store::{CaseStore, PostgrestCaseStore, SqliteCaseStore, StoreError};

pub const CONFIG_ENV: &str = "ACCIDENT_ANALYTICS_CONFIG";
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_ENV: &str = "SUPABASE_KEY";
pub const DB_PATH_ENV: &str = "ACCIDENT_ANALYTICS_DB";
pub const ALLOW_SIMULATED_ENV: &str = "ACCIDENT_ANALYTICS_ALLOW_SIMULATED";
pub const AI_PROVIDER_ENV: &str = "ACCIDENT_ANALYTICS_AI_PROVIDER";
pub const AI_MODEL_ENV: &str = "ACCIDENT_ANALYTICS_AI_MODEL";
pub const OLLAMA_URL_ENV: &str = "OLLAMA_URL";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const TIMEOUT_ENV: &str = "ACCIDENT_ANALYTICS_TIMEOUT_SECS";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    InvalidValue { key: String, value: String },
    Store(StoreError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "Failed to read config {:?}: {}", path, source),
            ConfigError::Parse { path, source } => write!(f, "Failed to parse config {:?}: {}", path, source),
            ConfigError::InvalidValue { key, value } => write!(f, "Invalid value for {}: {:?}", key, value),
            ConfigError::Store(e) => write!(f, "Case store configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Store(e) => Some(e),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

impl From<StoreError> for ConfigError {
    fn from(err: StoreError) -> Self {
        ConfigError::Store(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub jurisdiction: String,
    pub physics_method: PhysicsMethod,
    pub request_timeout_secs: u64,
    pub retry_cooldown_secs: u64,
    pub validation_step_delay_ms: u64,
    pub status_interval_ms: u64,
    /// Let the model answer with a simulated scenario when evidence is unusable
    pub allow_simulated_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            jurisdiction: DEFAULT_JURISDICTION.to_string(),
            physics_method: PhysicsMethod::default(),
            request_timeout_secs: 120,
            retry_cooldown_secs: 3,
            validation_step_delay_ms: 800,
            status_interval_ms: 1200,
            allow_simulated_fallback: false,
            max_payload_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    OpenAi,
    Ollama,
}

impl std::str::FromStr for AiProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(AiProviderKind::OpenAi),
            "ollama" => Ok(AiProviderKind::Ollama),
            other => Err(format!("Unknown AI provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<AiProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ollama endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgrest_url: Option<String>,
    #[serde(skip_serializing)]
    pub postgrest_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub ai: AiConfig,
    pub store: StoreConfig,
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

impl AppConfig {
    /// Load from the process environment
    pub fn load() -> ConfigResult<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for environment variables
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!("Loading config from: {:?}", path);
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(url) = lookup(SUPABASE_URL_ENV) {
            self.store.postgrest_url = Some(url);
        }
        if let Some(key) = lookup(SUPABASE_KEY_ENV) {
            self.store.postgrest_key = Some(key);
        }
        if let Some(path) = lookup(DB_PATH_ENV) {
            self.store.sqlite_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(ALLOW_SIMULATED_ENV) {
            self.analysis.allow_simulated_fallback = parse_bool(ALLOW_SIMULATED_ENV, &value)?;
        }
        if let Some(value) = lookup(AI_PROVIDER_ENV) {
            let kind = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: AI_PROVIDER_ENV.to_string(), value })?;
            self.ai.provider = Some(kind);
        }
        if let Some(model) = lookup(AI_MODEL_ENV) {
            self.ai.model = Some(model);
        }
        if let Some(url) = lookup(OLLAMA_URL_ENV) {
            self.ai.base_url = Some(url);
        }
        if let Some(key) = lookup(OPENAI_API_KEY_ENV) {
            self.ai.api_key = Some(key);
        }
        if let Some(value) = lookup(TIMEOUT_ENV) {
            self.analysis.request_timeout_secs = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: TIMEOUT_ENV.to_string(), value })?;
        }
        Ok(())
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        if self.analysis.allow_simulated_fallback {
            FallbackPolicy::AllowSimulated
        } else {
            FallbackPolicy::Disallow
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        let analysis = &self.analysis;
        OrchestratorSettings {
            request_timeout: Duration::from_secs(analysis.request_timeout_secs),
            retry_cooldown: Duration::from_secs(analysis.retry_cooldown_secs),
            status_interval: Duration::from_millis(analysis.status_interval_ms),
            validation_step_delay: Duration::from_millis(analysis.validation_step_delay_ms),
            max_payload_bytes: analysis.max_payload_bytes,
            physics_method: analysis.physics_method.clone(),
            fallback: self.fallback_policy(),
        }
    }

    /// Case store with the configured mirror: PostgREST, else SQLite, else none
    pub fn case_store(&self) -> ConfigResult<CaseStore> {
        let store = &self.store;
        match (&store.postgrest_url, &store.postgrest_key) {
            (Some(url), Some(key)) => {
                return Ok(CaseStore::with_remote(Arc::new(PostgrestCaseStore::new(url, key.clone())?)));
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("Remote case store needs both {} and {}, ignoring", SUPABASE_URL_ENV, SUPABASE_KEY_ENV);
            }
            (None, None) => {}
        }

        match &store.sqlite_path {
            Some(path) => Ok(CaseStore::with_remote(Arc::new(SqliteCaseStore::new(path)?))),
            None => Ok(CaseStore::new()),
        }
    }

    /// Configured analysis model, if any
    #[cfg(feature = "ai-assistant")]
    pub fn ai_provider(&self) -> Option<crate::ai::AiProvider> {
        use crate::ai::AiProvider;

        let kind = self.ai.provider.or_else(|| self.ai.api_key.as_ref().map(|_| AiProviderKind::OpenAi))?;
        Some(match kind {
            AiProviderKind::OpenAi => AiProvider::OpenAi {
                model: self.ai.model.clone().unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                api_key: self.ai.api_key.clone(),
            },
            AiProviderKind::Ollama => AiProvider::Ollama {
                model: self.ai.model.clone().unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                base_url: self.ai.base_url.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(env(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        let settings = config.orchestrator_settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(120));
        assert_eq!(settings.retry_cooldown, Duration::from_secs(3));
        assert_eq!(settings.validation_step_delay, Duration::from_millis(800));
        assert_eq!(settings.fallback, FallbackPolicy::Disallow);
        assert_eq!(config.analysis.jurisdiction, "California");
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::load_with(env(&[
            (ALLOW_SIMULATED_ENV, "true"),
            (TIMEOUT_ENV, "30"),
            (AI_PROVIDER_ENV, "Ollama"),
            (OLLAMA_URL_ENV, "http://localhost:11434"),
            (DB_PATH_ENV, "/tmp/cases.db"),
        ]))
        .unwrap();
        assert_eq!(config.fallback_policy(), FallbackPolicy::AllowSimulated);
        assert_eq!(config.analysis.request_timeout_secs, 30);
        assert_eq!(config.ai.provider, Some(AiProviderKind::Ollama));
        assert_eq!(config.store.sqlite_path, Some(PathBuf::from("/tmp/cases.db")));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            AppConfig::load_with(env(&[(TIMEOUT_ENV, "soon")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AppConfig::load_with(env(&[(ALLOW_SIMULATED_ENV, "maybe")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AppConfig::load_with(env(&[(AI_PROVIDER_ENV, "gemini")])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "analysis": { "jurisdiction": "Texas", "physics_method": "Crush Energy Analysis", "request_timeout_secs": 60 },
                 "ai": { "provider": "openai", "api_key": "sk-file" } }"#,
        )
        .unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config = AppConfig::load_with(env(&[(CONFIG_ENV, path_str.as_str()), (TIMEOUT_ENV, "90")])).unwrap();
        assert_eq!(config.analysis.jurisdiction, "Texas");
        assert_eq!(config.analysis.physics_method, PhysicsMethod::CrushEnergy);
        assert_eq!(config.analysis.request_timeout_secs, 90);
        assert_eq!(config.analysis.retry_cooldown_secs, 3);

        // Secrets are not written back
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-file"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::load_with(env(&[(CONFIG_ENV, "/nonexistent/config.json")])),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_case_store_selection() {
        let config = AppConfig::default();
        assert!(!config.case_store().unwrap().has_remote());

        let mut config = AppConfig::default();
        config.store.postgrest_url = Some("http://db.example.com".into());
        config.store.postgrest_key = Some("anon".into());
        assert!(matches!(config.case_store(), Err(ConfigError::Store(StoreError::InvalidUrl(_)))));

        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.store.sqlite_path = Some(dir.path().join("cases.db"));
        assert!(config.case_store().unwrap().has_remote());
    }
}
