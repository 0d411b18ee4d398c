//! Case and report store
//!
//! [`CaseStore`] owns the canonical case list for the session. Writes land
//! in the local list first and are then mirrored to an optional
//! [`RemoteCaseStore`] on a best-effort basis; a remote failure is logged
//! and never surfaces to the caller.

pub mod remote;
pub mod sqlite;
pub mod postgrest;

pub use remote::{CaseRow, RemoteCaseStore};
pub use sqlite::SqliteCaseStore;
pub use postgrest::PostgrestCaseStore;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::report::AnalysisReport;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Rows requested from the remote when listing cases
pub const RECENT_CASE_LIMIT: usize = 100;

/// Thumbnail used for remote rows stored without one
pub const DEFAULT_THUMBNAIL_URL: &str = "https://picsum.photos/400/225?grayscale";

pub const PLAINTIFF_LABEL: &str = "Vehicle B (Plaintiff)";
pub const DEFENDANT_LABEL: &str = "Vehicle A (Defendant)";

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Http(reqwest::Error),
    /// Remote answered with a non-success status
    Remote { status: u16, body: String },
    Serialization(serde_json::Error),
    InvalidUrl(String),
    Io(std::io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Http(e) => write!(f, "HTTP error: {}", e),
            StoreError::Remote { status, body } => write!(f, "Remote store returned {}: {}", status, body),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::InvalidUrl(e) => write!(f, "Invalid store URL: {}", e),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Http(e) => Some(e),
            StoreError::Serialization(e) => Some(e),
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// Case lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Draft,
    Processing,
    Admissible,
    #[serde(rename = "Analysis Complete")]
    AnalysisComplete,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Draft => "Draft",
            CaseStatus::Processing => "Processing",
            CaseStatus::Admissible => "Admissible",
            CaseStatus::AnalysisComplete => "Analysis Complete",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(CaseStatus::Draft),
            "Processing" => Ok(CaseStatus::Processing),
            "Admissible" => Ok(CaseStatus::Admissible),
            "Analysis Complete" => Ok(CaseStatus::AnalysisComplete),
            other => Err(format!("Unknown case status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parties {
    pub plaintiff: String,
    pub defendant: String,
}

/// A persisted unit of investigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFile {
    pub id: String,
    /// `CASE-<year>-<1000..9999>`
    pub reference_number: String,
    pub status: CaseStatus,
    pub date_created: NaiveDate,
    pub description: String,
    pub location: String,
    pub thumbnail_url: String,
    pub parties: Parties,
    #[serde(default, rename = "reportData", skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
}

impl CaseFile {
    pub fn has_report(&self) -> bool {
        self.report.is_some()
    }
}

/// Short description from the first sentence of an executive summary
pub fn summarize_description(executive_summary: &str) -> String {
    let first_sentence = executive_summary.split('.').next().unwrap_or_default();
    let clipped: String = first_sentence.chars().take(50).collect();
    format!("{}...", clipped)
}

/// `CASE-<year>-<1000..9999>`
pub fn new_reference_number(year: i32) -> String {
    let n = (uuid::Uuid::new_v4().as_u128() % 9000) as u32;
    format!("CASE-{}-{}", year, 1000 + n)
}

#[allow(clippy::too_many_arguments)]
fn placeholder_case(
    id: &str,
    reference_number: &str,
    status: CaseStatus,
    (y, m, d): (i32, u32, u32),
    description: &str,
    location: &str,
    thumbnail_url: &str,
    (plaintiff, defendant): (&str, &str),
) -> CaseFile {
    CaseFile {
        id: id.to_string(),
        reference_number: reference_number.to_string(),
        status,
        date_created: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
        description: description.to_string(),
        location: location.to_string(),
        thumbnail_url: thumbnail_url.to_string(),
        parties: Parties {
            plaintiff: plaintiff.to_string(),
            defendant: defendant.to_string(),
        },
        report: None,
    }
}

/// Demonstration cases shown when nothing else is available
pub fn placeholder_cases() -> Vec<CaseFile> {
    vec![
        placeholder_case(
            "c-101",
            "CASE-2024-8842",
            CaseStatus::Admissible,
            (2024, 5, 12),
            "Intersection Collision @ 4th & Main",
            "San Francisco, CA",
            "https://picsum.photos/400/225",
            ("J. Smith", "R. Roe"),
        ),
        placeholder_case(
            "c-102",
            "CASE-2024-9911",
            CaseStatus::Processing,
            (2024, 5, 14),
            "Rear-end on I-5 South",
            "Los Angeles, CA",
            "https://picsum.photos/400/226",
            ("SafeHaul Logistics", "T. Miller"),
        ),
        placeholder_case(
            "c-103",
            "CASE-2024-9950",
            CaseStatus::Draft,
            (2024, 5, 15),
            "Parking Lot Dispute",
            "Seattle, WA",
            "https://picsum.photos/400/227",
            ("Unknown", "L. Chen"),
        ),
    ]
}

/// Session case list with an optional remote mirror
pub struct CaseStore {
    local: Mutex<Vec<CaseFile>>,
    /// Ids created during this session, newest first
    session_created: Mutex<Vec<String>>,
    remote: Option<Arc<dyn RemoteCaseStore>>,
}

impl CaseStore {
    /// Local-only store seeded with the placeholder cases
    pub fn new() -> Self {
        Self {
            local: Mutex::new(placeholder_cases()),
            session_created: Mutex::new(Vec::new()),
            remote: None,
        }
    }

    pub fn with_remote(remote: Arc<dyn RemoteCaseStore>) -> Self {
        Self {
            remote: Some(remote),
            ..Self::new()
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn local(&self) -> MutexGuard<'_, Vec<CaseFile>> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session_created(&self) -> MutexGuard<'_, Vec<String>> {
        self.session_created.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All cases, most recent first
    pub async fn fetch_cases(&self) -> Vec<CaseFile> {
        let Some(remote) = self.remote.clone() else {
            tracing::debug!("No remote case store configured, using session cases");
            return self.local().clone();
        };

        match remote.select_recent(RECENT_CASE_LIMIT).await {
            Ok(rows) => {
                let mut cases: Vec<CaseFile> = rows.into_iter().map(CaseRow::into_case).collect();

                // Session writes the remote has not seen yet (failed or pending mirror)
                let created = self.session_created().clone();
                let local = self.local().clone();
                let missing: Vec<CaseFile> = created
                    .iter()
                    .filter(|id| !cases.iter().any(|c| &c.id == *id))
                    .filter_map(|id| local.iter().find(|c| &c.id == id).cloned())
                    .collect();

                if !missing.is_empty() {
                    tracing::debug!(count = missing.len(), "Merging unsynced session cases");
                }
                cases.splice(0..0, missing);
                cases
            }
            Err(e) => {
                tracing::warn!(store = remote.name(), "Case fetch failed, using session cases: {}", e);
                self.local().clone()
            }
        }
    }

    /// Persist a completed report as a new case; returns the case id.
    ///
    /// The local write always succeeds. The remote mirror is attempted
    /// afterwards and its failure is only logged.
    pub async fn create_case(&self, report: &AnalysisReport, jurisdiction: &str) -> String {
        let today = Utc::now().date_naive();
        let reference_number = new_reference_number(today.year());
        let case = CaseFile {
            id: format!("c-{}", uuid::Uuid::new_v4().simple()),
            thumbnail_url: format!("https://picsum.photos/seed/{}/400/225", reference_number),
            reference_number,
            status: CaseStatus::Admissible,
            date_created: today,
            description: summarize_description(&report.executive_summary),
            location: jurisdiction.to_string(),
            parties: Parties {
                plaintiff: PLAINTIFF_LABEL.to_string(),
                defendant: DEFENDANT_LABEL.to_string(),
            },
            report: Some(report.clone()),
        };
        let case_id = case.id.clone();

        {
            self.local().insert(0, case.clone());
            self.session_created().insert(0, case_id.clone());
        }

        audit::log_case_created(
            &case_id,
            &case.reference_number,
            jurisdiction,
            report.provenance.as_str(),
        );

        if let Some(remote) = self.remote.clone() {
            match remote.insert(CaseRow::from_case(&case)).await {
                Ok(()) => tracing::debug!(case_id = %case_id, store = remote.name(), "Case mirrored"),
                Err(e) => tracing::warn!(
                    case_id = %case_id,
                    store = remote.name(),
                    "Background case save failed, session copy kept: {}",
                    e
                ),
            }
        }

        case_id
    }

    /// Report attached to a case: local copy first, then the remote
    pub async fn get_report_by_case_id(&self, case_id: &str) -> Option<AnalysisReport> {
        let local = self
            .local()
            .iter()
            .find(|c| c.id == case_id)
            .and_then(|c| c.report.clone());
        if local.is_some() {
            return local;
        }

        let remote = self.remote.clone()?;
        match remote.select_report(case_id).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(case_id = %case_id, store = remote.name(), "Report fetch failed: {}", e);
                None
            }
        }
    }

    /// Report for display, falling back to the labelled placeholder report
    pub async fn report_or_placeholder(&self, case_id: &str) -> Result<AnalysisReport, serde_json::Error> {
        match self.get_report_by_case_id(case_id).await {
            Some(report) => Ok(report),
            None => AnalysisReport::placeholder(),
        }
    }
}

impl Default for CaseStore {
    fn default() -> Self {
        Self::new()
    }
}
