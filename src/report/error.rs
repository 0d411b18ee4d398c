//! Error types for report export

use std::fmt;
use std::io;

/// Result type alias for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur while exporting a report
#[derive(Debug)]
pub enum ReportError {
    /// I/O error (file read/write)
    Io(io::Error),
    /// PDF generation error
    Pdf(String),
    /// Serialization error
    Serialization(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "I/O error: {}", e),
            ReportError::Pdf(e) => write!(f, "PDF generation error: {}", e),
            ReportError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(e) => Some(e),
            ReportError::Serialization(e) => Some(e),
            ReportError::Pdf(_) => None,
        }
    }
}

impl From<io::Error> for ReportError {
    fn from(err: io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err)
    }
}

impl From<genpdf::error::Error> for ReportError {
    fn from(err: genpdf::error::Error) -> Self {
        ReportError::Pdf(err.to_string())
    }
}
