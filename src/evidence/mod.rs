//! Evidence intake
//!
//! Evidence items are queued by the operator, classified by the intake
//! affordance they arrived through, and read only once the orchestrator
//! builds an analysis request.

pub mod magic;
pub mod queue;

pub use queue::EvidenceQueue;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Result type alias for intake operations
pub type IntakeResult<T> = Result<T, IntakeError>;

/// Errors raised by the evidence queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// Operator confirmed intake with nothing queued
    EmptyQueue,
    /// No queued item has this id
    UnknownItem(String),
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeError::EmptyQueue => write!(f, "No evidence queued"),
            IntakeError::UnknownItem(id) => write!(f, "Unknown evidence item: {}", id),
        }
    }
}

impl std::error::Error for IntakeError {}

/// Media classification chosen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Document,
    Audio,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Other => "other",
        }
    }
}

/// Lifecycle of a queued item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStatus {
    Queued,
    Uploading,
    Analyzing,
    Complete,
}

/// Where an item's bytes live
#[derive(Debug, Clone)]
pub enum EvidenceSource {
    /// File on disk, read lazily
    File { path: PathBuf },
    /// Bytes already in memory (e.g. received over the wire)
    Inline {
        name: String,
        mime: Option<String>,
        bytes: Arc<[u8]>,
    },
}

impl EvidenceSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        EvidenceSource::File { path: path.into() }
    }

    pub fn inline(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        EvidenceSource::Inline {
            name: name.into(),
            mime: None,
            bytes: bytes.into(),
        }
    }

    /// File name shown to the operator
    pub fn display_name(&self) -> String {
        match self {
            EvidenceSource::File { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            EvidenceSource::Inline { name, .. } => name.clone(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            EvidenceSource::File { path } => Some(path),
            EvidenceSource::Inline { .. } => None,
        }
    }

    /// Whether the payload can still be read
    pub async fn is_available(&self) -> bool {
        match self {
            EvidenceSource::File { path } => tokio::fs::metadata(path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            EvidenceSource::Inline { .. } => true,
        }
    }

    /// Read the full payload
    pub async fn read(&self) -> std::io::Result<Arc<[u8]>> {
        match self {
            EvidenceSource::File { path } => Ok(tokio::fs::read(path).await?.into()),
            EvidenceSource::Inline { bytes, .. } => Ok(Arc::clone(bytes)),
        }
    }

    /// MIME supplied with the payload, if any
    pub fn declared_mime(&self) -> Option<&str> {
        match self {
            EvidenceSource::File { .. } => None,
            EvidenceSource::Inline { mime, .. } => mime.as_deref(),
        }
    }
}

/// A single queued media artifact
#[derive(Debug, Clone)]
pub struct EvidenceItem {
    pub id: String,
    /// Set when the analysis is committed to a case
    pub case_id: Option<String>,
    pub source: EvidenceSource,
    pub kind: MediaKind,
    pub status: EvidenceStatus,
    /// 0-100
    pub progress: u8,
}

impl EvidenceItem {
    pub fn name(&self) -> String {
        self.source.display_name()
    }
}
