//! PostgREST case mirror
//!
//! Talks to a Supabase-style `/rest/v1/cases` endpoint. The API key is sent
//! as both `apikey` and bearer token and is never logged.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use url::Url;

use super::remote::{decode_report_data, CaseRow, RemoteCaseStore};
use super::{StoreError, StoreResult};
use crate::audit;
use crate::report::AnalysisReport;

const TABLE_PATH: &str = "rest/v1/cases";

/// Validate a PostgREST base URL.
///
/// HTTPS is allowed for any host, plain HTTP only for localhost.
pub fn validate_store_url(url: &str) -> StoreResult<Url> {
    let parsed = Url::parse(url).map_err(|e| StoreError::InvalidUrl(format!("{}: {}", url, e)))?;
    let host = parsed.host_str().unwrap_or("");

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]") => Ok(parsed),
        "http" => {
            audit::log_security_event("blocked_store_url", &format!("Plain HTTP case store at {}", host));
            Err(StoreError::InvalidUrl(format!(
                "HTTP is only allowed for localhost case stores, use HTTPS for {}",
                host
            )))
        }
        scheme => {
            audit::log_security_event("blocked_store_url", &format!("Unsupported scheme {}", scheme));
            Err(StoreError::InvalidUrl(format!("Unsupported URL scheme '{}'", scheme)))
        }
    }
}

#[derive(Deserialize)]
struct ReportOnly {
    #[serde(default)]
    report_data: Option<serde_json::Value>,
}

/// HTTP client for the `cases` table
pub struct PostgrestCaseStore {
    client: Client,
    table_url: Url,
    api_key: String,
}

impl PostgrestCaseStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> StoreResult<Self> {
        let mut base = validate_store_url(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let table_url = base
            .join(TABLE_PATH)
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;

        tracing::info!(host = base.host_str().unwrap_or(""), "Remote case store configured");
        Ok(Self {
            client: Client::new(),
            table_url,
            api_key: api_key.into(),
        })
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Remote { status: status.as_u16(), body })
    }
}

#[async_trait]
impl RemoteCaseStore for PostgrestCaseStore {
    fn name(&self) -> &str {
        "postgrest"
    }

    async fn select_recent(&self, limit: usize) -> StoreResult<Vec<CaseRow>> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn insert(&self, row: CaseRow) -> StoreResult<()> {
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=minimal")
            .header(header::CONTENT_TYPE, "application/json")
            .json(&[row])
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn select_report(&self, case_id: &str) -> StoreResult<Option<AnalysisReport>> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("select", "report_data".to_string()), ("id", format!("eq.{}", case_id))])
            .send()
            .await?;

        let rows: Vec<ReportOnly> = Self::check(response).await?.json().await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| decode_report_data(case_id, r.report_data)))
    }
}
