//! End-to-end analysis flows through the public API, with a scripted
//! provider standing in for the model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use accident_analytics_lib::analysis::{
    decode_report, AnalysisError, AnalysisEvent, AnalysisOrchestrator, AnalysisProvider, AnalysisRequest,
    AnalysisResult, AnalysisState, FallbackPolicy, OrchestratorSettings,
};
use accident_analytics_lib::evidence::{EvidenceSource, MediaKind};
use accident_analytics_lib::report::{export, AnalysisReport, Provenance};
use accident_analytics_lib::store::{CaseStatus, CaseStore};
use accident_analytics_lib::validation::{CheckStatus, CheckTransition};

fn evidence_report() -> AnalysisReport {
    let mut report = AnalysisReport::placeholder().expect("placeholder fixture parses");
    report.provenance = Provenance::Evidence;
    report
}

enum Step {
    Answer(String),
    Fail(String),
}

/// Replays canned answers and records what it was asked
struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    seen_parts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            seen_parts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn request_analysis(&self, request: AnalysisRequest) -> AnalysisResult<AnalysisReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_parts
            .lock()
            .unwrap()
            .extend(request.parts().iter().map(|p| p.digest.clone()));

        // Simulated latency so status lines get a chance to appear
        tokio::time::sleep(Duration::from_secs(5)).await;

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Answer(text)) => decode_report(&text),
            Some(Step::Fail(reason)) => Err(AnalysisError::Invocation(reason)),
            None => Err(AnalysisError::EmptyResponse),
        }
    }
}

fn fenced(report: &AnalysisReport) -> String {
    format!("Here is the analysis:\n```json\n{}\n```", serde_json::to_string_pretty(report).unwrap())
}

fn collect(rx: &mut tokio::sync::mpsc::UnboundedReceiver<AnalysisEvent>) -> Vec<AnalysisEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn terminal_checks(events: &[AnalysisEvent]) -> Vec<CheckTransition> {
    events
        .iter()
        .filter_map(|e| match e {
            AnalysisEvent::Check(t) if t.to.is_terminal() => Some(t.clone()),
            _ => None,
        })
        .collect()
}

fn write_evidence(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[tokio::test(start_paused = true)]
async fn scenario_a_single_video_to_admissible_case() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_evidence(&dir, "dashcam.mp4", b"\0\0\0\x18ftypmp42 dashcam");

    let report = evidence_report();
    let provider = ScriptedProvider::new(vec![Step::Answer(fenced(&report))]);
    let mut orchestrator = AnalysisOrchestrator::new(provider.clone(), OrchestratorSettings::default());
    let mut rx = orchestrator.subscribe();

    orchestrator.begin_case("California").unwrap();
    orchestrator
        .add_evidence([EvidenceSource::file(&video)], MediaKind::Video)
        .unwrap();

    let produced = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), AnalysisState::Complete);
    assert_eq!(produced, report);

    let events = collect(&mut rx);
    let checks = terminal_checks(&events);
    let ids: Vec<&str> = checks.iter().map(|c| c.check_id.as_str()).collect();
    assert_eq!(ids, vec!["frame", "compression", "gps", "audio", "voice"]);
    assert_eq!(checks[0].to, CheckStatus::Valid);
    // No audio was submitted
    assert_eq!(checks[3].to, CheckStatus::Warning);
    assert_eq!(checks[4].to, CheckStatus::Warning);

    // Every check finished before the provider was asked
    let last_check = events.iter().rposition(|e| matches!(e, AnalysisEvent::Check(_))).unwrap();
    let requesting = events
        .iter()
        .position(|e| matches!(e, AnalysisEvent::StateChanged { to: AnalysisState::Requesting, .. }))
        .unwrap();
    assert!(last_check < requesting);

    let statuses: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AnalysisEvent::Status(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    assert!(statuses.contains(&"Initializing Physics Engine (Auto-Detect)..."));
    assert!(statuses.contains(&"Analyzing Liability (California)..."));
    assert!(statuses.iter().all(|s| !s.contains('%')));

    let store = CaseStore::new();
    let committed = orchestrator.commit(&store).await.unwrap();
    let cases = store.fetch_cases().await;
    let case = cases.iter().find(|c| c.id == committed.case_id).unwrap();
    assert_eq!(case.status, CaseStatus::Admissible);
    assert_eq!(case.location, "California");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_failure_cools_down_with_queue_intact() {
    let provider = ScriptedProvider::new(vec![
        Step::Fail("connection reset".into()),
        Step::Answer(fenced(&evidence_report())),
    ]);
    let mut orchestrator = AnalysisOrchestrator::new(provider.clone(), OrchestratorSettings::default());
    let mut rx = orchestrator.subscribe();

    orchestrator.begin_case("Nevada").unwrap();
    let added = orchestrator
        .add_evidence(
            [
                EvidenceSource::inline("front.mp4", vec![1u8; 32]),
                EvidenceSource::inline("rear.mp4", vec![2u8; 32]),
            ],
            MediaKind::Video,
        )
        .unwrap();

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, AnalysisError::Invocation(_)));
    assert_eq!(orchestrator.state(), AnalysisState::Failed);

    let events = collect(&mut rx);
    let failure = events
        .iter()
        .find_map(|e| match e {
            AnalysisEvent::Failure(text) => Some(text.clone()),
            _ => None,
        })
        .unwrap();
    assert!(!failure.contains("connection reset"));

    let started = tokio::time::Instant::now();
    orchestrator.recover_after_cooldown().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(orchestrator.state(), AnalysisState::Intake);

    let queued: Vec<&str> = orchestrator.evidence().iter().map(|e| e.id.as_str()).collect();
    let original: Vec<&str> = added.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(queued, original);

    // Same queue: the second attempt reuses the cached request
    orchestrator.run().await.unwrap();
    assert_eq!(provider.calls(), 2);
    let seen = provider.seen_parts.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[..2], seen[2..]);
}

#[tokio::test(start_paused = true)]
async fn changed_queue_is_revalidated_after_failure() {
    let provider = ScriptedProvider::new(vec![Step::Fail("503".into()), Step::Answer(fenced(&evidence_report()))]);
    let mut orchestrator = AnalysisOrchestrator::new(provider, OrchestratorSettings::default());
    orchestrator.begin_case("Oregon").unwrap();
    orchestrator
        .add_evidence([EvidenceSource::inline("front.mp4", vec![1u8; 8])], MediaKind::Video)
        .unwrap();
    assert!(orchestrator.run().await.is_err());

    orchestrator.recover_after_cooldown().await.unwrap();
    orchestrator
        .add_evidence([EvidenceSource::inline("911.wav", b"RIFF\0\0\0\0WAVE".to_vec())], MediaKind::Audio)
        .unwrap();

    let mut rx = orchestrator.subscribe();
    orchestrator.run().await.unwrap();
    let checks = terminal_checks(&collect(&mut rx));
    assert_eq!(checks.len(), 5);
    assert!(checks.iter().all(|c| c.to == CheckStatus::Valid));
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out() {
    let provider = ScriptedProvider::new(vec![Step::Answer(fenced(&evidence_report()))]);
    let settings = OrchestratorSettings {
        request_timeout: Duration::from_secs(2),
        ..OrchestratorSettings::default()
    };
    let mut orchestrator = AnalysisOrchestrator::new(provider, settings);
    orchestrator.begin_case("California").unwrap();
    orchestrator
        .add_evidence([EvidenceSource::inline("a.mp4", vec![0u8; 4])], MediaKind::Video)
        .unwrap();

    assert!(matches!(orchestrator.run().await, Err(AnalysisError::Timeout(_))));
    assert_eq!(orchestrator.state(), AnalysisState::Failed);
    assert!(orchestrator.report().is_none());
}

#[tokio::test(start_paused = true)]
async fn simulated_report_needs_explicit_opt_in() {
    let mut simulated = evidence_report();
    simulated.provenance = Provenance::Simulated;
    simulated.executive_summary = format!("SIMULATED SCENARIO: {}", simulated.executive_summary);

    let provider = ScriptedProvider::new(vec![Step::Answer(fenced(&simulated))]);
    let mut orchestrator = AnalysisOrchestrator::new(provider, OrchestratorSettings::default());
    orchestrator.begin_case("California").unwrap();
    orchestrator
        .add_evidence([EvidenceSource::inline("blurry.mp4", vec![0u8; 4])], MediaKind::Video)
        .unwrap();
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, AnalysisError::SimulatedReportRejected));
    assert_eq!(orchestrator.state(), AnalysisState::Failed);

    let provider = ScriptedProvider::new(vec![Step::Answer(fenced(&simulated))]);
    let settings = OrchestratorSettings {
        fallback: FallbackPolicy::AllowSimulated,
        ..OrchestratorSettings::default()
    };
    let mut orchestrator = AnalysisOrchestrator::new(provider, settings);
    orchestrator.begin_case("California").unwrap();
    orchestrator
        .add_evidence([EvidenceSource::inline("blurry.mp4", vec![0u8; 4])], MediaKind::Video)
        .unwrap();
    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.provenance, Provenance::Simulated);
}

#[tokio::test(start_paused = true)]
async fn mandatory_sections_and_idempotent_json_export() {
    let provider = ScriptedProvider::new(vec![Step::Answer(fenced(&evidence_report()))]);
    let mut orchestrator = AnalysisOrchestrator::new(provider, OrchestratorSettings::default());
    orchestrator.begin_case("California").unwrap();
    orchestrator
        .add_evidence([EvidenceSource::inline("a.mp4", vec![0u8; 4])], MediaKind::Video)
        .unwrap();
    let report = orchestrator.run().await.unwrap();

    assert!(!report.executive_summary.trim().is_empty());
    assert!(!report.liability.rationale.trim().is_empty());
    assert!(!report.timeline_events.is_empty());
    assert!(report.check_conformance().is_conformant());

    let first = export::to_json(&report).unwrap();
    let second = export::to_json(&report).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn scenario_c_and_d_local_store() {
    let store = CaseStore::new();
    let statuses: Vec<CaseStatus> = store.fetch_cases().await.iter().map(|c| c.status).collect();
    assert_eq!(statuses, vec![CaseStatus::Admissible, CaseStatus::Processing, CaseStatus::Draft]);

    assert!(store.get_report_by_case_id("c-101").await.is_none());
    assert!(store.get_report_by_case_id("c-does-not-exist").await.is_none());
}
