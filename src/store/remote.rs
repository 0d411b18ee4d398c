//! Remote case mirror
//!
//! Row shape of the shared `cases` table and the trait both mirrors
//! implement.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{CaseFile, CaseStatus, Parties, StoreResult, DEFAULT_THUMBNAIL_URL};
use crate::report::AnalysisReport;

/// One row of the `cases` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRow {
    pub id: String,
    pub reference_number: String,
    pub status: String,
    /// RFC 3339
    pub created_at: String,
    pub description: String,
    pub location: String,
    pub plaintiff: String,
    pub defendant: String,
    /// Stored as opaque JSON; older writers may not match the report contract
    #[serde(default)]
    pub report_data: Option<serde_json::Value>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl CaseRow {
    pub fn from_case(case: &CaseFile) -> Self {
        Self {
            id: case.id.clone(),
            reference_number: case.reference_number.clone(),
            status: case.status.as_str().to_string(),
            created_at: Utc::now().to_rfc3339(),
            description: case.description.clone(),
            location: case.location.clone(),
            plaintiff: case.parties.plaintiff.clone(),
            defendant: case.parties.defendant.clone(),
            report_data: case.report.as_ref().and_then(|report| match serde_json::to_value(report) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(case_id = %case.id, "Report not serializable, mirroring without it: {}", e);
                    None
                }
            }),
            thumbnail_url: Some(case.thumbnail_url.clone()),
        }
    }

    pub fn into_case(self) -> CaseFile {
        let status = self.status.parse().unwrap_or_else(|e| {
            tracing::warn!(case_id = %self.id, "{}, treating as draft", e);
            CaseStatus::Draft
        });

        let report = decode_report_data(&self.id, self.report_data);
        CaseFile {
            date_created: created_date(&self.created_at),
            status,
            thumbnail_url: self
                .thumbnail_url
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_THUMBNAIL_URL.to_string()),
            parties: Parties {
                plaintiff: self.plaintiff,
                defendant: self.defendant,
            },
            id: self.id,
            reference_number: self.reference_number,
            description: self.description,
            location: self.location,
            report,
        }
    }
}

/// Decode one row's report, dropping it when it does not fit the contract
pub fn decode_report_data(case_id: &str, value: Option<serde_json::Value>) -> Option<AnalysisReport> {
    let value = value.filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(case_id = %case_id, "Stored report does not decode, ignoring it: {}", e);
            None
        }
    }
}

/// Calendar date of a stored timestamp
fn created_date(created_at: &str) -> NaiveDate {
    DateTime::parse_from_rfc3339(created_at)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .or_else(|_| NaiveDate::parse_from_str(created_at.get(..10).unwrap_or(created_at), "%Y-%m-%d"))
        .unwrap_or_else(|_| Utc::now().date_naive())
}

/// Durable mirror of the case list
#[async_trait]
pub trait RemoteCaseStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &str;

    /// Most recent rows first
    async fn select_recent(&self, limit: usize) -> StoreResult<Vec<CaseRow>>;

    async fn insert(&self, row: CaseRow) -> StoreResult<()>;

    /// `Ok(None)` when the case or its report does not exist
    async fn select_report(&self, case_id: &str) -> StoreResult<Option<AnalysisReport>>;
}
