//! Analysis orchestrator
//!
//! Drives one case from evidence intake to a finished report:
//!
//! ```text
//! Idle -> Intake -> Validating -> Requesting -> Parsing -> Complete
//!                      |              |            |
//!                      v              v            v
//!                    Intake         Failed <-------+
//!                                     |
//!                                     v
//!                                   Intake (cool-down or retry)
//! ```
//!
//! Every operation takes `&mut self`, so a single orchestrator only ever runs
//! one flow at a time. Dropping an in-flight future abandons its result;
//! [`AnalysisOrchestrator::cancel`] then returns to `Idle`. No case exists
//! until [`AnalysisOrchestrator::commit`] is called from `Complete`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use super::error::{AnalysisError, AnalysisResult};
use super::provider::AnalysisProvider;
use super::request::{AnalysisRequest, FallbackPolicy, PhysicsMethod, DEFAULT_JURISDICTION};
use crate::audit::{self, AnalysisAuditContext};
use crate::evidence::{EvidenceItem, EvidenceQueue, EvidenceSource, EvidenceStatus, IntakeError, MediaKind};
use crate::report::AnalysisReport;
use crate::store::CaseStore;
use crate::validation::{CheckStatus, ValidationCheck, ValidationError, ValidationPipeline, DEFAULT_STEP_DELAY};

pub const STATUS_UPLOADING: &str = "Encrypting and uploading media...";
pub const STATUS_FINALIZING: &str = "Finalizing Forensic Report...";

/// Status lines shown while the provider works, in order
pub fn waiting_statuses(physics_method: &PhysicsMethod, jurisdiction: &str) -> [String; 3] {
    [
        format!("Initializing Physics Engine ({})...", physics_method),
        "Analyzing Voice Stress Microtremors...".to_string(),
        format!("Analyzing Liability ({})...", jurisdiction),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Intake,
    Validating,
    Requesting,
    Parsing,
    Complete,
    Failed,
}

impl AnalysisState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Intake => "intake",
            AnalysisState::Validating => "validating",
            AnalysisState::Requesting => "requesting",
            AnalysisState::Parsing => "parsing",
            AnalysisState::Complete => "complete",
            AnalysisState::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: AnalysisState) -> bool {
        use AnalysisState::*;
        match (self, next) {
            // Cancel or commit
            (Idle, Idle) => false,
            (_, Idle) => true,
            (Idle, Intake) => true,
            (Intake, Validating) => true,
            (Validating, Requesting) => true,
            // Validation aborted
            (Validating, Intake) => true,
            (Requesting, Parsing) | (Requesting, Failed) => true,
            (Parsing, Complete) | (Parsing, Failed) => true,
            (Failed, Intake) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AnalysisEvent {
    StateChanged { from: AnalysisState, to: AnalysisState },
    Check(crate::validation::CheckTransition),
    /// Human readable progress line
    Status(String),
    /// Non-blocking finding the operator should see
    Advisory(String),
    /// Operator-safe failure text
    Failure(String),
}

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub request_timeout: Duration,
    /// Wait before a failed run returns to intake on its own
    pub retry_cooldown: Duration,
    pub status_interval: Duration,
    pub validation_step_delay: Duration,
    pub max_payload_bytes: Option<u64>,
    pub physics_method: PhysicsMethod,
    pub fallback: FallbackPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            retry_cooldown: Duration::from_secs(3),
            status_interval: Duration::from_millis(1200),
            validation_step_delay: DEFAULT_STEP_DELAY,
            max_payload_bytes: None,
            physics_method: PhysicsMethod::default(),
            fallback: FallbackPolicy::default(),
        }
    }
}

/// Result of committing a finished analysis
#[derive(Debug, Clone)]
pub struct CommittedCase {
    pub case_id: String,
    pub jurisdiction: String,
    /// Evidence tagged with the new case id
    pub evidence: Vec<EvidenceItem>,
    pub report: AnalysisReport,
}

struct ValidatedQueue {
    revision: u64,
    checks: Vec<ValidationCheck>,
}

pub struct AnalysisOrchestrator {
    state: AnalysisState,
    settings: OrchestratorSettings,
    provider: Arc<dyn AnalysisProvider>,
    pipeline: ValidationPipeline,
    queue: EvidenceQueue,
    jurisdiction: String,
    validated: Option<ValidatedQueue>,
    cached_request: Option<(u64, AnalysisRequest)>,
    report: Option<AnalysisReport>,
    report_advisories: Vec<String>,
    last_failure: Option<String>,
    subscribers: Vec<mpsc::UnboundedSender<AnalysisEvent>>,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn AnalysisProvider>, settings: OrchestratorSettings) -> Self {
        audit::log_fallback_policy(settings.fallback, "orchestrator_created");
        Self {
            pipeline: ValidationPipeline::standard(settings.validation_step_delay),
            state: AnalysisState::Idle,
            settings,
            provider,
            queue: EvidenceQueue::new(),
            jurisdiction: DEFAULT_JURISDICTION.to_string(),
            validated: None,
            cached_request: None,
            report: None,
            report_advisories: Vec::new(),
            last_failure: None,
            subscribers: Vec::new(),
        }
    }

    /// Replace the standard checks
    pub fn with_pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    /// Check states of the last completed validation
    pub fn checks(&self) -> Option<&[ValidationCheck]> {
        self.validated.as_ref().map(|v| v.checks.as_slice())
    }

    /// Validation warnings followed by report advisories
    pub fn advisories(&self) -> Vec<String> {
        let warnings = self
            .checks()
            .unwrap_or_default()
            .iter()
            .filter(|c| c.status == CheckStatus::Warning)
            .map(|c| format!("{}: {}", c.label, c.note.as_deref().unwrap_or_default()));
        warnings.chain(self.report_advisories.iter().cloned()).collect()
    }

    /// Operator text for the most recent failure
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<AnalysisEvent> {
        self.subscribers.retain(|s| !s.is_closed());
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&self, event: AnalysisEvent) {
        for subscriber in &self.subscribers {
            // Closed receivers are pruned on the next subscribe
            let _ = subscriber.send(event.clone());
        }
    }

    fn emit_status(&self, text: impl Into<String>) {
        self.emit(AnalysisEvent::Status(text.into()));
    }

    fn transition(&mut self, to: AnalysisState) -> AnalysisResult<()> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(AnalysisError::InvalidTransition { from, to });
        }
        self.state = to;
        tracing::debug!(from = from.as_str(), to = to.as_str(), "Analysis state changed");
        self.emit(AnalysisEvent::StateChanged { from, to });
        Ok(())
    }

    fn require(&self, expected: AnalysisState, operation: &'static str) -> AnalysisResult<()> {
        if self.state != expected {
            return Err(AnalysisError::InvalidOperation { operation, state: self.state });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.validated = None;
        self.cached_request = None;
        self.report = None;
        self.report_advisories.clear();
        self.last_failure = None;
    }

    /// Start a new case in intake
    pub fn begin_case(&mut self, jurisdiction: &str) -> AnalysisResult<()> {
        self.require(AnalysisState::Idle, "begin a case")?;
        self.reset();
        self.jurisdiction = match jurisdiction.trim() {
            "" => DEFAULT_JURISDICTION.to_string(),
            jx => jx.to_string(),
        };
        self.transition(AnalysisState::Intake)
    }

    pub fn set_jurisdiction(&mut self, jurisdiction: &str) -> AnalysisResult<()> {
        self.require(AnalysisState::Intake, "change jurisdiction")?;
        if self.jurisdiction != jurisdiction {
            self.jurisdiction = jurisdiction.to_string();
            // The cached request carries the old jurisdiction
            self.cached_request = None;
        }
        Ok(())
    }

    pub fn add_evidence(
        &mut self,
        sources: impl IntoIterator<Item = EvidenceSource>,
        kind: MediaKind,
    ) -> AnalysisResult<Vec<EvidenceItem>> {
        self.require(AnalysisState::Intake, "add evidence")?;
        Ok(self.queue.add(sources, kind))
    }

    pub fn remove_evidence(&mut self, id: &str) -> AnalysisResult<EvidenceItem> {
        self.require(AnalysisState::Intake, "remove evidence")?;
        Ok(self.queue.remove(id)?)
    }

    /// Queued evidence in insertion order
    pub fn evidence(&self) -> &[EvidenceItem] {
        self.queue.items()
    }

    /// Leave intake and run every validation check.
    ///
    /// A queue that already passed validation unchanged is not re-validated.
    /// An aborted check returns to intake and keeps nothing from the run.
    pub async fn confirm_intake(&mut self) -> AnalysisResult<Vec<ValidationCheck>> {
        self.require(AnalysisState::Intake, "confirm intake")?;
        if self.queue.is_empty() {
            return Err(IntakeError::EmptyQueue.into());
        }
        self.transition(AnalysisState::Validating)?;

        let revision = self.queue.revision();
        if let Some(validated) = self.validated.as_ref().filter(|v| v.revision == revision) {
            tracing::debug!(revision, "Queue unchanged since last validation, skipping checks");
            return Ok(validated.checks.clone());
        }
        self.validated = None;

        let mut run = self.pipeline.run(self.queue.list());
        while let Some(step) = run.next().await {
            match step {
                Ok(transition) => {
                    let warning = (transition.to == CheckStatus::Warning).then(|| {
                        let note = transition.note.clone().unwrap_or_default();
                        audit::log_validation_warning(&transition.check_id, &note);
                        format!("{}: {}", transition.label, note)
                    });
                    self.emit(AnalysisEvent::Check(transition));
                    if let Some(advisory) = warning {
                        self.emit(AnalysisEvent::Advisory(advisory));
                    }
                }
                Err(err) => {
                    let ValidationError::Aborted { check_id, reason } = &err;
                    audit::log_validation_abort(check_id, reason);
                    self.cached_request = None;
                    self.transition(AnalysisState::Intake)?;
                    let err = AnalysisError::from(err);
                    self.last_failure = Some(err.operator_message().to_string());
                    self.emit(AnalysisEvent::Failure(err.operator_message().to_string()));
                    return Err(err);
                }
            }
        }

        let checks = run.checks().to_vec();
        self.validated = Some(ValidatedQueue { revision, checks: checks.clone() });
        Ok(checks)
    }

    /// Send the validated evidence for analysis and wait for the report
    pub async fn request_analysis(&mut self) -> AnalysisResult<AnalysisReport> {
        self.require(AnalysisState::Validating, "request analysis")?;
        let revision = self.queue.revision();
        let validated = self
            .validated
            .as_ref()
            .is_some_and(|v| v.revision == revision && v.checks.iter().all(|c| c.status.is_terminal()));
        if !validated {
            return Err(AnalysisError::InvalidOperation {
                operation: "request analysis before validation completes",
                state: self.state,
            });
        }

        self.transition(AnalysisState::Requesting)?;
        self.report_advisories.clear();
        self.last_failure = None;

        let audit_ctx = AnalysisAuditContext::new(self.queue.len());
        audit::log_fallback_policy(self.settings.fallback, &audit_ctx.run_id);

        let request = match self.prepare_request(revision).await {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e, &audit_ctx)),
        };

        self.queue.set_status_all(EvidenceStatus::Analyzing, 50);
        audit_ctx.log_operation(
            "provider_request",
            &format!(
                "provider={} parts={} bytes={}",
                self.provider.name(),
                request.parts().len(),
                request.total_bytes()
            ),
        );

        let report = match self.invoke(request).await {
            Ok(report) => report,
            Err(e) => {
                if e.is_parse_failure() {
                    self.transition(AnalysisState::Parsing)?;
                }
                return Err(self.fail(e, &audit_ctx));
            }
        };

        self.transition(AnalysisState::Parsing)?;
        if let Err(e) = self.accept(&report, &audit_ctx) {
            return Err(self.fail(e, &audit_ctx));
        }

        self.emit_status(STATUS_FINALIZING);
        self.queue.set_status_all(EvidenceStatus::Complete, 100);
        self.report = Some(report.clone());
        audit_ctx.log_operation("report_accepted", report.provenance.as_str());
        self.transition(AnalysisState::Complete)?;
        Ok(report)
    }

    /// Confirm intake and request analysis in one go
    pub async fn run(&mut self) -> AnalysisResult<AnalysisReport> {
        self.confirm_intake().await?;
        self.request_analysis().await
    }

    /// Manual retry after a failure, reusing the queue
    pub async fn retry(&mut self) -> AnalysisResult<AnalysisReport> {
        self.require(AnalysisState::Failed, "retry")?;
        self.transition(AnalysisState::Intake)?;
        self.run().await
    }

    /// Wait out the cool-down, then return a failed run to intake
    pub async fn recover_after_cooldown(&mut self) -> AnalysisResult<()> {
        self.require(AnalysisState::Failed, "recover")?;
        tokio::time::sleep(self.settings.retry_cooldown).await;
        self.transition(AnalysisState::Intake)
    }

    /// Drop everything and return to idle
    pub fn cancel(&mut self) -> AnalysisResult<()> {
        if self.state == AnalysisState::Idle {
            return Ok(());
        }
        self.transition(AnalysisState::Idle)?;
        self.reset();
        tracing::info!("Analysis cancelled");
        Ok(())
    }

    /// Persist the finished report as a case and return to idle
    pub async fn commit(&mut self, store: &CaseStore) -> AnalysisResult<CommittedCase> {
        self.require(AnalysisState::Complete, "commit")?;
        let report = self.report.take().ok_or(AnalysisError::InvalidOperation {
            operation: "commit without a report",
            state: self.state,
        })?;

        let case_id = store.create_case(&report, &self.jurisdiction).await;
        self.queue.assign_case(&case_id);
        let committed = CommittedCase {
            case_id,
            jurisdiction: self.jurisdiction.clone(),
            evidence: self.queue.list(),
            report,
        };

        self.transition(AnalysisState::Idle)?;
        self.reset();
        Ok(committed)
    }

    async fn prepare_request(&mut self, revision: u64) -> AnalysisResult<AnalysisRequest> {
        self.emit_status(STATUS_UPLOADING);

        if let Some((cached_revision, request)) = &self.cached_request {
            if *cached_revision == revision {
                tracing::debug!(revision, "Reusing cached analysis request");
                return Ok(request.clone());
            }
        }

        self.queue.set_status_all(EvidenceStatus::Uploading, 0);
        let request = AnalysisRequest::build(
            self.queue.items(),
            &self.jurisdiction,
            self.settings.physics_method.clone(),
            self.settings.fallback,
            self.settings.max_payload_bytes,
        )
        .await?;

        self.cached_request = Some((revision, request.clone()));
        Ok(request)
    }

    /// Provider call under the timeout, emitting status lines while waiting
    async fn invoke(&self, request: AnalysisRequest) -> AnalysisResult<AnalysisReport> {
        let provider = Arc::clone(&self.provider);
        let statuses = waiting_statuses(request.physics_method(), request.jurisdiction());

        let call = provider.request_analysis(request);
        tokio::pin!(call);
        let deadline = tokio::time::sleep(self.settings.request_timeout);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.settings.status_interval.max(Duration::from_millis(1)));
        let mut next_status = 0;

        loop {
            tokio::select! {
                result = &mut call => return result,
                _ = &mut deadline => return Err(AnalysisError::Timeout(self.settings.request_timeout)),
                _ = ticker.tick(), if next_status < statuses.len() => {
                    self.emit_status(statuses[next_status].clone());
                    next_status += 1;
                }
            }
        }
    }

    /// Conformance and fallback policy gate
    fn accept(&mut self, report: &AnalysisReport, audit_ctx: &AnalysisAuditContext) -> AnalysisResult<()> {
        let conformance = report.check_conformance();
        if !conformance.is_conformant() {
            return Err(AnalysisError::Conformance(
                conformance.violations().into_iter().cloned().collect(),
            ));
        }

        if report.is_simulated() {
            let accepted = self.settings.fallback.allows_simulated();
            audit::log_simulated_report(accepted, &audit_ctx.run_id);
            if !accepted {
                return Err(AnalysisError::SimulatedReportRejected);
            }
            self.report_advisories
                .push("Report is a simulated scenario, not derived from the evidence".to_string());
        }

        for issue in conformance.advisories() {
            self.report_advisories.push(issue.to_string());
        }
        for advisory in &self.report_advisories {
            self.emit(AnalysisEvent::Advisory(advisory.clone()));
        }
        Ok(())
    }

    fn fail(&mut self, err: AnalysisError, audit_ctx: &AnalysisAuditContext) -> AnalysisError {
        tracing::warn!(run_id = %audit_ctx.run_id, state = self.state.as_str(), "Analysis failed: {}", err);
        audit_ctx.log_operation("analysis_failed", &err.to_string());

        // Evidence that vanished after validation invalidates that validation
        if matches!(err, AnalysisError::EvidenceUnavailable { .. }) {
            self.validated = None;
            self.cached_request = None;
        }

        if let Err(e) = self.transition(AnalysisState::Failed) {
            tracing::error!("{}", e);
        }
        let message = err.operator_message().to_string();
        self.last_failure = Some(message.clone());
        self.emit(AnalysisEvent::Failure(message));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::types::tests::{minimal_report, minimal_report_json};
    use crate::report::Provenance;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Reply {
        Report(AnalysisReport),
        Text(String),
        Error(String),
        Hang,
    }

    /// Provider answering from a script, one reply per call
    struct Scripted {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl AnalysisProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn request_analysis(&self, _request: AnalysisRequest) -> AnalysisResult<AnalysisReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Report(report)) => Ok(report),
                Some(Reply::Text(text)) => crate::analysis::decode_report(&text),
                Some(Reply::Error(e)) => Err(AnalysisError::Invocation(e)),
                Some(Reply::Hang) | None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(AnalysisError::EmptyResponse)
                }
            }
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            validation_step_delay: Duration::ZERO,
            ..OrchestratorSettings::default()
        }
    }

    fn orchestrator(provider: Arc<Scripted>) -> AnalysisOrchestrator {
        let mut orch = AnalysisOrchestrator::new(provider, settings());
        orch.begin_case("California").unwrap();
        orch.add_evidence([EvidenceSource::inline("front.mp4", vec![0u8; 16])], MediaKind::Video)
            .unwrap();
        orch
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AnalysisEvent>) -> Vec<AnalysisEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_transition_table() {
        use AnalysisState::*;
        assert!(Idle.can_transition_to(Intake));
        assert!(!Idle.can_transition_to(Validating));
        assert!(!Intake.can_transition_to(Requesting));
        assert!(!Validating.can_transition_to(Complete));
        assert!(!Requesting.can_transition_to(Complete));
        assert!(!Failed.can_transition_to(Requesting));
        assert!(Failed.can_transition_to(Intake));
        assert!(Complete.can_transition_to(Idle));
        assert!(!Complete.can_transition_to(Intake));
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_operations_rejected() {
        let mut orch = AnalysisOrchestrator::new(Scripted::new(vec![]), settings());
        assert!(matches!(
            orch.add_evidence([EvidenceSource::inline("a.mp4", vec![1u8])], MediaKind::Video),
            Err(AnalysisError::InvalidOperation { state: AnalysisState::Idle, .. })
        ));
        assert!(matches!(orch.request_analysis().await, Err(AnalysisError::InvalidOperation { .. })));
        assert!(matches!(orch.retry().await, Err(AnalysisError::InvalidOperation { .. })));
        assert_eq!(orch.state(), AnalysisState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_blocks_intake() {
        let mut orch = AnalysisOrchestrator::new(Scripted::new(vec![]), settings());
        orch.begin_case("").unwrap();
        assert_eq!(orch.jurisdiction(), DEFAULT_JURISDICTION);
        let err = orch.confirm_intake().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Intake(IntakeError::EmptyQueue)));
        assert_eq!(orch.state(), AnalysisState::Intake);
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_events() {
        let provider = Scripted::new(vec![Reply::Report(minimal_report())]);
        let mut orch = orchestrator(provider.clone());
        let mut rx = orch.subscribe();

        let report = orch.run().await.unwrap();
        assert_eq!(report, minimal_report());
        assert_eq!(orch.state(), AnalysisState::Complete);
        assert!(orch.evidence().iter().all(|e| e.status == EvidenceStatus::Complete && e.progress == 100));

        let events = drain(&mut rx);
        let last_check = events.iter().rposition(|e| matches!(e, AnalysisEvent::Check(_))).unwrap();
        let requesting = events
            .iter()
            .position(|e| matches!(e, AnalysisEvent::StateChanged { to: AnalysisState::Requesting, .. }))
            .unwrap();
        assert!(last_check < requesting);
        assert!(events.contains(&AnalysisEvent::Status(STATUS_UPLOADING.to_string())));
        assert!(events.contains(&AnalysisEvent::Status(STATUS_FINALIZING.to_string())));
        assert!(events.iter().any(|e| matches!(e, AnalysisEvent::Advisory(a) if a.contains("No audio evidence"))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails() {
        let mut orch = orchestrator(Scripted::new(vec![Reply::Hang]));
        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout(_)));
        assert_eq!(orch.state(), AnalysisState::Failed);
        assert!(orch.last_failure().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_lines_while_waiting() {
        let mut orch = orchestrator(Scripted::new(vec![Reply::Hang]));
        let mut rx = orch.subscribe();
        let _ = orch.run().await;
        let statuses: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                AnalysisEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                STATUS_UPLOADING.to_string(),
                "Initializing Physics Engine (Auto-Detect)...".to_string(),
                "Analyzing Voice Stress Microtremors...".to_string(),
                "Analyzing Liability (California)...".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_failure_then_retry() {
        let fenced = format!("```json\n{}\n```", minimal_report_json());
        let provider = Scripted::new(vec![Reply::Text("no report today".into()), Reply::Text(fenced)]);
        let mut orch = orchestrator(provider.clone());
        let mut rx = orch.subscribe();

        let err = orch.run().await.unwrap_err();
        assert!(err.is_parse_failure());
        assert_eq!(orch.state(), AnalysisState::Failed);
        let events = drain(&mut rx);
        assert!(events.contains(&AnalysisEvent::StateChanged {
            from: AnalysisState::Parsing,
            to: AnalysisState::Failed
        }));

        let report = orch.retry().await.unwrap();
        assert_eq!(report.liability.defendant_percentage, 80.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        // Unchanged queue: no checks re-run on retry
        assert!(!drain(&mut rx).iter().any(|e| matches!(e, AnalysisEvent::Check(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_report_policy() {
        let mut simulated = minimal_report();
        simulated.provenance = Provenance::Simulated;

        let mut orch = orchestrator(Scripted::new(vec![Reply::Report(simulated.clone())]));
        assert!(matches!(orch.run().await, Err(AnalysisError::SimulatedReportRejected)));
        assert_eq!(orch.state(), AnalysisState::Failed);

        let mut allowing = AnalysisOrchestrator::new(
            Scripted::new(vec![Reply::Report(simulated)]),
            OrchestratorSettings { fallback: FallbackPolicy::AllowSimulated, ..settings() },
        );
        allowing.begin_case("California").unwrap();
        allowing
            .add_evidence([EvidenceSource::inline("a.mp4", vec![1u8])], MediaKind::Video)
            .unwrap();
        let report = allowing.run().await.unwrap();
        assert!(report.is_simulated());
        assert!(allowing.advisories().iter().any(|a| a.contains("simulated")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_conformant_report_fails() {
        let mut report = minimal_report();
        report.liability.rationale = "  ".into();
        let mut orch = orchestrator(Scripted::new(vec![Reply::Report(report)]));
        assert!(matches!(orch.run().await, Err(AnalysisError::Conformance(_))));
        assert_eq!(orch.state(), AnalysisState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocation_error_and_cooldown() {
        let mut orch = orchestrator(Scripted::new(vec![Reply::Error("503".into())]));
        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Invocation(_)));

        let start = tokio::time::Instant::now();
        orch.recover_after_cooldown().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(orch.state(), AnalysisState::Intake);
        assert_eq!(orch.evidence().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_aborts_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp4");
        std::fs::write(&path, b"x").unwrap();

        let mut orch = AnalysisOrchestrator::new(Scripted::new(vec![]), settings());
        orch.begin_case("Texas").unwrap();
        orch.add_evidence([EvidenceSource::file(&path)], MediaKind::Video).unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = orch.confirm_intake().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Validation(_)));
        assert_eq!(orch.state(), AnalysisState::Intake);
        assert!(orch.checks().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_document_aborts_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let mut orch = AnalysisOrchestrator::new(Scripted::new(vec![]), settings());
        orch.begin_case("Nevada").unwrap();
        orch.add_evidence([EvidenceSource::file(&path)], MediaKind::Document).unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = orch.confirm_intake().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Validation(_)));
        assert_eq!(orch.state(), AnalysisState::Intake);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evidence_lost_after_validation_forces_revalidation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashcam.mp4");
        std::fs::write(&path, b"frames").unwrap();

        let provider = Scripted::new(vec![]);
        let mut orch = AnalysisOrchestrator::new(provider.clone(), settings());
        orch.begin_case("Nevada").unwrap();
        orch.add_evidence([EvidenceSource::file(&path)], MediaKind::Video).unwrap();
        orch.confirm_intake().await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = orch.request_analysis().await.unwrap_err();
        assert!(matches!(err, AnalysisError::EvidenceUnavailable { .. }));
        assert_eq!(orch.state(), AnalysisState::Failed);
        assert!(orch.checks().is_none());

        orch.recover_after_cooldown().await.unwrap();
        let mut rx = orch.subscribe();
        let err = orch.run().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Validation(_)));
        assert_eq!(orch.state(), AnalysisState::Intake);
        assert!(drain(&mut rx).iter().any(|e| matches!(e, AnalysisEvent::Check(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_commit() {
        let mut orch = orchestrator(Scripted::new(vec![Reply::Report(minimal_report())]));
        orch.cancel().unwrap();
        assert_eq!(orch.state(), AnalysisState::Idle);
        assert!(orch.evidence().is_empty());

        let store = CaseStore::new();
        let mut orch = orchestrator(Scripted::new(vec![Reply::Report(minimal_report())]));
        assert!(matches!(orch.commit(&store).await, Err(AnalysisError::InvalidOperation { .. })));
        orch.run().await.unwrap();

        let committed = orch.commit(&store).await.unwrap();
        assert_eq!(orch.state(), AnalysisState::Idle);
        assert!(committed.evidence.iter().all(|e| e.case_id.as_deref() == Some(committed.case_id.as_str())));
        assert_eq!(store.get_report_by_case_id(&committed.case_id).await, Some(minimal_report()));
    }
}
