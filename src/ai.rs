//! AI providers for evidence analysis and the forensic chat assistant
//!
//! This module is feature-gated behind `ai-assistant`. It plugs vendor SDKs
//! into the [`AnalysisProvider`] seam and backs the conversational assistant.
//!
//! # Security
//!
//! - Ollama URLs are validated to prevent SSRF attacks
//! - Only localhost HTTP or HTTPS connections are allowed
//! - All AI interactions are logged on the `ai_audit` target; API keys never are
//!
//! # Usage
//!
//! ```rust,ignore
//! use accident_analytics_lib::ai::{AiAnalysisProvider, AiProvider};
//!
//! let provider = AiAnalysisProvider::new(AiProvider::OpenAi {
//!     model: "gpt-4o".to_string(),
//!     api_key: None,
//! })?;
//! let orchestrator = AnalysisOrchestrator::new(Arc::new(provider), settings);
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::analysis::{
    decode_report, AnalysisError, AnalysisProvider, AnalysisRequest, AnalysisResult, DirectiveRenderer, EvidencePart,
    CHAT_FALLBACK_REPLY, CHAT_SYSTEM_PROMPT,
};
use crate::audit;
use crate::evidence::magic;
use crate::report::AnalysisReport;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Validate a URL for Ollama connections to prevent SSRF attacks.
///
/// # Security Rules
/// - HTTP is only allowed for localhost/127.0.0.1
/// - HTTPS is allowed for any host
/// - Other schemes are rejected
pub fn validate_ollama_url(url: &str) -> AnalysisResult<()> {
    let parsed = url::Url::parse(url)
        .map_err(|e| AnalysisError::NotConfigured(format!("Invalid Ollama URL: {}", e)))?;

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("");

    match scheme {
        "https" => {
            tracing::info!(target: "ai_audit", "Ollama connection to HTTPS endpoint: {}", host);
            Ok(())
        }
        "http" => {
            let is_localhost = matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]");
            if is_localhost {
                tracing::info!(target: "ai_audit", "Ollama connection to local endpoint: {}", url);
                Ok(())
            } else {
                audit::log_security_event("blocked_ollama_url", &format!("HTTP to non-localhost host {}", host));
                Err(AnalysisError::NotConfigured(format!(
                    "HTTP connections to Ollama are only allowed for localhost. \
                     Use HTTPS for remote servers or connect to {}. Attempted URL: {}",
                    DEFAULT_OLLAMA_URL, url
                )))
            }
        }
        _ => {
            audit::log_security_event("blocked_ollama_url", &format!("Invalid URL scheme {}", scheme));
            Err(AnalysisError::NotConfigured(format!(
                "Invalid URL scheme '{}'. Only HTTP (localhost) and HTTPS are allowed.",
                scheme
            )))
        }
    }
}

fn log_ai_interaction(provider: &str, model: &str, operation: &str, prompt_length: usize, attachments: usize) {
    tracing::info!(
        target: "ai_audit",
        provider = provider,
        model = model,
        operation = operation,
        prompt_chars = prompt_length,
        attachments = attachments,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "AI request sent"
    );
}

fn log_ai_response(provider: &str, model: &str, success: bool, response_length: usize) {
    if success {
        tracing::info!(
            target: "ai_audit",
            provider = provider,
            model = model,
            response_chars = response_length,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "AI response received"
        );
    } else {
        tracing::warn!(
            target: "ai_audit",
            provider = provider,
            model = model,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "AI request failed"
        );
    }
}

/// AI provider configuration
#[derive(Debug, Clone)]
pub enum AiProvider {
    /// Ollama (local LLM, text only)
    Ollama {
        /// Model name (e.g., "llama3.2", "mistral")
        model: String,
        /// Base URL (default: http://localhost:11434)
        base_url: Option<String>,
    },
    /// OpenAI chat completions
    OpenAi {
        /// Model name (e.g., "gpt-4o")
        model: String,
        /// API key (will use OPENAI_API_KEY env var if not provided)
        api_key: Option<String>,
    },
}

impl AiProvider {
    pub fn name(&self) -> &'static str {
        match self {
            AiProvider::Ollama { .. } => "ollama",
            AiProvider::OpenAi { .. } => "openai",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            AiProvider::Ollama { model, .. } | AiProvider::OpenAi { model, .. } => model,
        }
    }

    /// Whether evidence of this MIME type is sent as content
    pub fn attaches(&self, part: &EvidencePart) -> bool {
        match self {
            AiProvider::OpenAi { .. } => magic::is_image(&part.mime),
            AiProvider::Ollama { .. } => false,
        }
    }

    async fn complete(
        &self,
        operation: &str,
        messages: Vec<ChatMessage>,
        images: Vec<String>,
        json_output: bool,
    ) -> AnalysisResult<String> {
        let prompt_length = messages.iter().map(|m| m.content.len()).sum();
        log_ai_interaction(self.name(), self.model(), operation, prompt_length, images.len());

        let result = match self {
            AiProvider::Ollama { model, base_url } => {
                complete_with_ollama(model, base_url.as_deref(), &messages).await
            }
            AiProvider::OpenAi { model, api_key } => {
                complete_with_openai(model, api_key.as_deref(), messages, images, json_output).await
            }
        };

        log_ai_response(
            self.name(),
            self.model(),
            result.is_ok(),
            result.as_ref().map(|s| s.len()).unwrap_or(0),
        );
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Flatten a conversation into one prompt for text-completion models
pub fn transcript(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let speaker = match message.role {
            ChatRole::System => {
                prompt.push_str(&message.content);
                prompt.push_str("\n\n");
                continue;
            }
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{}: {}\n", speaker, message.content));
    }
    prompt.push_str("Assistant:");
    prompt
}

async fn complete_with_ollama(model: &str, base_url: Option<&str>, messages: &[ChatMessage]) -> AnalysisResult<String> {
    use langchain_rust::language_models::llm::LLM;
    use langchain_rust::llm::ollama::client::{Ollama, OllamaClient};

    let url = base_url.unwrap_or(DEFAULT_OLLAMA_URL);
    validate_ollama_url(url)?;

    let client = OllamaClient::try_new(url)
        .map_err(|e| AnalysisError::NotConfigured(format!("Invalid Ollama URL: {}", e)))?;
    let ollama = Ollama::new(Arc::new(client), model, None);

    ollama
        .invoke(&transcript(messages))
        .await
        .map_err(|e| AnalysisError::Invocation(e.to_string()))
}

async fn complete_with_openai(
    model: &str,
    api_key: Option<&str>,
    messages: Vec<ChatMessage>,
    images: Vec<String>,
    json_output: bool,
) -> AnalysisResult<String> {
    use async_openai::types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageUrlArgs, ResponseFormat,
    };
    use async_openai::Client;

    let invocation = |e: async_openai::error::OpenAIError| AnalysisError::Invocation(e.to_string());

    let client = match api_key {
        Some(key) => Client::with_config(async_openai::config::OpenAIConfig::new().with_api_key(key)),
        // Falls back to OPENAI_API_KEY env var
        None => Client::new(),
    };

    let last_user = messages.iter().rposition(|m| m.role == ChatRole::User);
    let mut request_messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(messages.len());
    for (index, message) in messages.into_iter().enumerate() {
        let built: ChatCompletionRequestMessage = match message.role {
            ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content)
                .build()
                .map_err(invocation)?
                .into(),
            ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content)
                .build()
                .map_err(invocation)?
                .into(),
            // Images ride along with the final user turn
            ChatRole::User if Some(index) == last_user && !images.is_empty() => {
                let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(message.content)
                        .build()
                        .map_err(invocation)?
                        .into(),
                ];
                for url in &images {
                    parts.push(
                        ChatCompletionRequestMessageContentPartImageArgs::default()
                            .image_url(ImageUrlArgs::default().url(url.as_str()).build().map_err(invocation)?)
                            .build()
                            .map_err(invocation)?
                            .into(),
                    );
                }
                ChatCompletionRequestUserMessageArgs::default()
                    .content(parts)
                    .build()
                    .map_err(invocation)?
                    .into()
            }
            ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content)
                .build()
                .map_err(invocation)?
                .into(),
        };
        request_messages.push(built);
    }

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(model).messages(request_messages);
    if json_output {
        args.response_format(ResponseFormat::JsonObject);
    }
    let request = args.build().map_err(invocation)?;

    let response = client.chat().create(request).await.map_err(invocation)?;

    response
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .filter(|content| !content.trim().is_empty())
        .ok_or(AnalysisError::EmptyResponse)
}

/// [`AnalysisProvider`] backed by a generative model
pub struct AiAnalysisProvider {
    provider: AiProvider,
    directive: DirectiveRenderer,
}

impl AiAnalysisProvider {
    pub fn new(provider: AiProvider) -> AnalysisResult<Self> {
        if let AiProvider::Ollama { base_url: Some(url), .. } = &provider {
            validate_ollama_url(url)?;
        }
        Ok(Self {
            provider,
            directive: DirectiveRenderer::new()?,
        })
    }

    /// Use a custom directive wording
    pub fn with_directive(mut self, directive: DirectiveRenderer) -> Self {
        self.directive = directive;
        self
    }

    pub fn provider(&self) -> &AiProvider {
        &self.provider
    }

    /// Directive text and the data URLs sent alongside it
    pub fn build_prompt(&self, request: &AnalysisRequest) -> AnalysisResult<(String, Vec<String>)> {
        let directive = self.directive.render(request, |part| self.provider.attaches(part))?;
        let images = request
            .parts()
            .iter()
            .filter(|part| self.provider.attaches(part))
            .map(EvidencePart::data_url)
            .collect();
        Ok((directive, images))
    }
}

#[async_trait]
impl AnalysisProvider for AiAnalysisProvider {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn request_analysis(&self, request: AnalysisRequest) -> AnalysisResult<AnalysisReport> {
        let (directive, images) = self.build_prompt(&request)?;
        let text = self
            .provider
            .complete("analysis", vec![ChatMessage::user(directive)], images, true)
            .await?;
        decode_report(&text)
    }
}

/// Conversational assistant answering forensic questions
pub struct ForensicAssistant {
    provider: AiProvider,
}

impl ForensicAssistant {
    pub fn new(provider: AiProvider) -> Self {
        Self { provider }
    }

    /// Reply to `message` given the prior turns.
    ///
    /// Never fails: any provider error yields the fixed apology.
    pub async fn chat(&self, history: &[ChatMessage], message: &str) -> String {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(CHAT_SYSTEM_PROMPT));
        messages.extend(history.iter().filter(|m| m.role != ChatRole::System).cloned());
        messages.push(ChatMessage::user(message));

        match self.provider.complete("chat", messages, Vec::new(), false).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => CHAT_FALLBACK_REPLY.to_string(),
            Err(e) => {
                tracing::warn!(target: "ai_audit", provider = self.provider.name(), "Chat failed: {}", e);
                CHAT_FALLBACK_REPLY.to_string()
            }
        }
    }
}
