//! Evidence validation pipeline
//!
//! An ordered list of [`Checker`]s run strictly one after another. A run is
//! consumed step by step through [`ValidationRun::next`], which yields every
//! status transition as it happens: `Pending -> Checking`, then
//! `Checking -> Valid | Warning`. A checker returning
//! [`CheckOutcome::Error`] aborts the run and nothing of it carries forward.

pub mod checks;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::evidence::EvidenceItem;

pub use checks::SimulatedCheck;

/// Delay used by the standard checks
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(800);

/// Result type alias for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A check could not complete
    Aborted { check_id: String, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Aborted { check_id, reason } => {
                write!(f, "Validation aborted at '{}': {}", check_id, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pending,
    Checking,
    Valid,
    Warning,
}

impl CheckStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckStatus::Valid | CheckStatus::Warning)
    }
}

/// What a checker concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Valid,
    /// Does not block analysis but must be shown to the operator
    Warning(String),
    /// Check could not complete
    Error(String),
}

/// One integrity or authenticity test applied before analysis
#[async_trait]
pub trait Checker: Send + Sync {
    /// Stable identifier, e.g. `"frame"`
    fn id(&self) -> &str;

    /// Human label
    fn label(&self) -> &str;

    async fn check(&self, items: &[EvidenceItem]) -> CheckOutcome;
}

/// Displayed state of one check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationCheck {
    pub id: String,
    pub label: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A single status change of a check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckTransition {
    /// Position in the pipeline
    pub index: usize,
    pub check_id: String,
    pub label: String,
    pub from: CheckStatus,
    pub to: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Ordered checker list
#[derive(Clone)]
pub struct ValidationPipeline {
    checkers: Vec<Arc<dyn Checker>>,
}

impl ValidationPipeline {
    pub fn new(checkers: Vec<Arc<dyn Checker>>) -> Self {
        Self { checkers }
    }

    /// The five standard checks, each taking `step_delay`
    pub fn standard(step_delay: Duration) -> Self {
        Self::new(checks::standard_checks(step_delay))
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    pub fn check_ids(&self) -> Vec<String> {
        self.checkers.iter().map(|c| c.id().to_string()).collect()
    }

    /// Start a fresh run over a snapshot of the queue
    pub fn run(&self, items: Vec<EvidenceItem>) -> ValidationRun {
        let checks = self
            .checkers
            .iter()
            .map(|c| ValidationCheck {
                id: c.id().to_string(),
                label: c.label().to_string(),
                status: CheckStatus::Pending,
                note: None,
            })
            .collect();

        ValidationRun {
            checkers: self.checkers.clone(),
            items,
            checks,
            cursor: 0,
            state: RunState::Ready,
        }
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::standard(DEFAULT_STEP_DELAY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Current check is pending
    Ready,
    /// Current check is running
    Checking,
    Finished,
    Aborted,
}

/// One pass of the pipeline. Finite and not restartable.
pub struct ValidationRun {
    checkers: Vec<Arc<dyn Checker>>,
    items: Vec<EvidenceItem>,
    checks: Vec<ValidationCheck>,
    cursor: usize,
    state: RunState,
}

impl ValidationRun {
    /// Advance by one transition.
    ///
    /// Returns `None` once every check is terminal or after an abort.
    pub async fn next(&mut self) -> Option<ValidationResult<CheckTransition>> {
        match self.state {
            RunState::Finished | RunState::Aborted => None,
            RunState::Ready => {
                if self.cursor >= self.checks.len() {
                    self.state = RunState::Finished;
                    return None;
                }
                self.state = RunState::Checking;
                Some(Ok(self.transition(CheckStatus::Checking, None)))
            }
            RunState::Checking => {
                let checker = Arc::clone(&self.checkers[self.cursor]);
                match checker.check(&self.items).await {
                    CheckOutcome::Valid => Some(Ok(self.complete(CheckStatus::Valid, None))),
                    CheckOutcome::Warning(note) => {
                        Some(Ok(self.complete(CheckStatus::Warning, Some(note))))
                    }
                    CheckOutcome::Error(reason) => {
                        self.state = RunState::Aborted;
                        tracing::warn!(check = checker.id(), reason = %reason, "Validation aborted");
                        Some(Err(ValidationError::Aborted {
                            check_id: checker.id().to_string(),
                            reason,
                        }))
                    }
                }
            }
        }
    }

    /// Drain the run, returning the final check states
    pub async fn finish(mut self) -> ValidationResult<Vec<ValidationCheck>> {
        while let Some(step) = self.next().await {
            step?;
        }
        Ok(self.checks)
    }

    pub fn checks(&self) -> &[ValidationCheck] {
        &self.checks
    }

    /// True only when every check reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.state != RunState::Aborted && self.checks.iter().all(|c| c.status.is_terminal())
    }

    fn complete(&mut self, status: CheckStatus, note: Option<String>) -> CheckTransition {
        let transition = self.transition(status, note);
        self.cursor += 1;
        self.state = if self.cursor >= self.checks.len() {
            RunState::Finished
        } else {
            RunState::Ready
        };
        transition
    }

    fn transition(&mut self, to: CheckStatus, note: Option<String>) -> CheckTransition {
        let check = &mut self.checks[self.cursor];
        let from = check.status;
        check.status = to;
        check.note = note.clone();
        CheckTransition {
            index: self.cursor,
            check_id: check.id.clone(),
            label: check.label.clone(),
            from,
            to,
            note,
        }
    }
}
