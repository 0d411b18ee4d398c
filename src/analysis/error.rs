//! Error types for the analysis flow

use std::fmt;
use std::io;
use std::time::Duration;

use super::orchestrator::AnalysisState;
use crate::evidence::IntakeError;
use crate::report::ConformanceIssue;
use crate::validation::ValidationError;

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Status text shown for any failed analysis attempt
pub const ANALYSIS_FAILED_MESSAGE: &str = "Analysis failed. Retrying with the queued evidence...";

#[derive(Debug)]
pub enum AnalysisError {
    /// State machine refused the move
    InvalidTransition { from: AnalysisState, to: AnalysisState },
    /// Operation not available in the current state
    InvalidOperation { operation: &'static str, state: AnalysisState },
    Intake(IntakeError),
    Validation(ValidationError),
    /// Evidence payload could not be read when building the request
    EvidenceUnavailable { name: String, source: io::Error },
    /// Evidence payload over the configured size limit
    PayloadTooLarge { name: String, size: u64, limit: u64 },
    /// Collaborator call failed (network, authentication, vendor error)
    Invocation(String),
    /// Collaborator did not answer in time
    Timeout(Duration),
    /// Collaborator answered with no content
    EmptyResponse,
    /// Response text is not a report
    Schema(serde_json::Error),
    /// Report parsed but breaks the contract rules
    Conformance(Vec<ConformanceIssue>),
    /// Simulated report while the fallback is disabled
    SimulatedReportRejected,
    /// Directive template failed to render
    Template(tera::Error),
    /// No provider configured
    NotConfigured(String),
}

impl AnalysisError {
    /// Text safe to show the operator; never carries raw error detail
    pub fn operator_message(&self) -> &'static str {
        match self {
            AnalysisError::InvalidTransition { .. } | AnalysisError::InvalidOperation { .. } => {
                "That action is not available right now."
            }
            AnalysisError::Intake(_) => "Add at least one evidence file to continue.",
            AnalysisError::Validation(_)
            | AnalysisError::EvidenceUnavailable { .. }
            | AnalysisError::PayloadTooLarge { .. } => {
                "Evidence validation could not complete. Please check the queued files."
            }
            AnalysisError::NotConfigured(_) => "The analysis service is not configured.",
            AnalysisError::Invocation(_)
            | AnalysisError::Timeout(_)
            | AnalysisError::EmptyResponse
            | AnalysisError::Schema(_)
            | AnalysisError::Conformance(_)
            | AnalysisError::SimulatedReportRejected
            | AnalysisError::Template(_) => ANALYSIS_FAILED_MESSAGE,
        }
    }

    /// Whether the response reached the parsing stage
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            AnalysisError::Schema(_)
                | AnalysisError::Conformance(_)
                | AnalysisError::SimulatedReportRejected
        )
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidTransition { from, to } => {
                write!(f, "Invalid transition: {} -> {}", from.as_str(), to.as_str())
            }
            AnalysisError::InvalidOperation { operation, state } => {
                write!(f, "Cannot {} while {}", operation, state.as_str())
            }
            AnalysisError::Intake(e) => write!(f, "Intake error: {}", e),
            AnalysisError::Validation(e) => write!(f, "{}", e),
            AnalysisError::EvidenceUnavailable { name, source } => {
                write!(f, "Evidence '{}' unavailable: {}", name, source)
            }
            AnalysisError::PayloadTooLarge { name, size, limit } => {
                write!(f, "Evidence '{}' is {} bytes, limit is {}", name, size, limit)
            }
            AnalysisError::Invocation(e) => write!(f, "Analysis provider error: {}", e),
            AnalysisError::Timeout(d) => write!(f, "Analysis timed out after {}s", d.as_secs()),
            AnalysisError::EmptyResponse => write!(f, "Analysis provider returned no content"),
            AnalysisError::Schema(e) => write!(f, "Response does not match the report schema: {}", e),
            AnalysisError::Conformance(issues) => {
                let joined: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
                write!(f, "Report failed conformance: {}", joined.join("; "))
            }
            AnalysisError::SimulatedReportRejected => {
                write!(f, "Simulated report rejected: fallback is disabled")
            }
            AnalysisError::Template(e) => write!(f, "Directive template error: {}", e),
            AnalysisError::NotConfigured(e) => write!(f, "Analysis provider not configured: {}", e),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Intake(e) => Some(e),
            AnalysisError::Validation(e) => Some(e),
            AnalysisError::EvidenceUnavailable { source, .. } => Some(source),
            AnalysisError::Schema(e) => Some(e),
            AnalysisError::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IntakeError> for AnalysisError {
    fn from(err: IntakeError) -> Self {
        AnalysisError::Intake(err)
    }
}

impl From<ValidationError> for AnalysisError {
    fn from(err: ValidationError) -> Self {
        AnalysisError::Validation(err)
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Schema(err)
    }
}

impl From<tera::Error> for AnalysisError {
    fn from(err: tera::Error) -> Self {
        AnalysisError::Template(err)
    }
}
