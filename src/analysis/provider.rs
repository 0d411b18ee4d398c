//! Analysis provider seam
//!
//! The orchestrator only knows [`AnalysisProvider`]; vendor SDKs live behind
//! it (see `crate::ai`). Model output is unwrapped with [`decode_report`]
//! before the structural parse.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::error::{AnalysisError, AnalysisResult};
use super::request::AnalysisRequest;
use crate::report::AnalysisReport;

/// External model producing a report for a request
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// May be slow and non-deterministic; a retry with the same request can
    /// yield a different report
    async fn request_analysis(&self, request: AnalysisRequest) -> AnalysisResult<AnalysisReport>;
}

/// First opening fence to last closing fence, optionally tagged `json`.
/// Greedy so fences quoted inside narrative strings stay in the body.
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*)\s*```").expect("valid regex"));

/// Strip code fences and surrounding prose, leaving the JSON object text
pub fn unwrap_response(text: &str) -> &str {
    let trimmed = text.trim();

    let inner = match FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => trimmed,
    };

    // Prose before or after the object
    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if start < end => &inner[start..=end],
        _ => inner,
    }
}

/// Parse model output into a report
pub fn decode_report(text: &str) -> AnalysisResult<AnalysisReport> {
    let body = unwrap_response(text);
    if body.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(serde_json::from_str(body)?)
}
