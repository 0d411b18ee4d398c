//! Forensic Audit Logging
//!
//! Provides structured logging for chain of custody: every evidence read,
//! validation outcome, fallback decision and case write is logged on the
//! `forensic_audit` target with a timestamp.

use tracing::{info, warn};

use crate::analysis::FallbackPolicy;

/// Log an evidence payload read for an analysis request
pub fn log_evidence_read(evidence_id: &str, name: &str, mime: &str, size: usize, digest: &str) {
    info!(
        target: "forensic_audit",
        operation = "evidence_read",
        evidence_id = evidence_id,
        name = name,
        mime = mime,
        size = size,
        digest = digest,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Evidence payload read"
    );
}

/// Log a validation check that ended in a warning
pub fn log_validation_warning(check_id: &str, note: &str) {
    warn!(
        target: "forensic_audit",
        operation = "validation_warning",
        check_id = check_id,
        note = note,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Validation check raised a warning"
    );
}

/// Log a validation run that could not complete
pub fn log_validation_abort(check_id: &str, reason: &str) {
    warn!(
        target: "forensic_audit",
        operation = "validation_abort",
        check_id = check_id,
        reason = reason,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Validation aborted, returning to intake"
    );
}

/// Log the fallback policy in force.
///
/// Simulated reports are not evidence, so enabling the fallback is always
/// logged at warn level.
pub fn log_fallback_policy(policy: FallbackPolicy, context: &str) {
    match policy {
        FallbackPolicy::AllowSimulated => warn!(
            target: "forensic_audit",
            operation = "fallback_policy",
            policy = policy.as_str(),
            context = context,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Simulated report fallback is ENABLED"
        ),
        FallbackPolicy::Disallow => info!(
            target: "forensic_audit",
            operation = "fallback_policy",
            policy = policy.as_str(),
            context = context,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Simulated report fallback is disabled"
        ),
    }
}

/// Log a simulated report reaching the orchestrator
pub fn log_simulated_report(accepted: bool, run_id: &str) {
    warn!(
        target: "forensic_audit",
        operation = "simulated_report",
        run_id = run_id,
        accepted = accepted,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Analysis returned a simulated report"
    );
}

/// Log a committed case
pub fn log_case_created(case_id: &str, reference_number: &str, jurisdiction: &str, provenance: &str) {
    info!(
        target: "forensic_audit",
        operation = "case_created",
        case_id = case_id,
        reference_number = reference_number,
        jurisdiction = jurisdiction,
        provenance = provenance,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Case created"
    );
}

/// Log report export
pub fn log_report_export(case_id: &str, format: &str, output_path: &std::path::Path) {
    info!(
        target: "forensic_audit",
        operation = "report_export",
        case_id = case_id,
        format = format,
        output_path = %output_path.display(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Forensic report exported"
    );
}

/// Log security event (blocked URL, rejected token, etc.)
pub fn log_security_event(event_type: &str, description: &str) {
    warn!(
        target: "forensic_audit",
        event_type = "security",
        security_event = event_type,
        description = description,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Security event"
    );
}

/// Audit context spanning one analysis run
pub struct AnalysisAuditContext {
    pub run_id: String,
    pub evidence_count: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisAuditContext {
    pub fn new(evidence_count: usize) -> Self {
        let ctx = Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            evidence_count,
            started_at: chrono::Utc::now(),
        };

        info!(
            target: "forensic_audit",
            operation = "analysis_start",
            run_id = %ctx.run_id,
            evidence_count = ctx.evidence_count,
            timestamp = %ctx.started_at.to_rfc3339(),
            "Analysis run started"
        );

        ctx
    }

    pub fn log_operation(&self, operation: &str, details: &str) {
        info!(
            target: "forensic_audit",
            run_id = %self.run_id,
            operation = operation,
            details = details,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Analysis operation"
        );
    }
}

impl Drop for AnalysisAuditContext {
    fn drop(&mut self) {
        let duration = chrono::Utc::now() - self.started_at;
        info!(
            target: "forensic_audit",
            operation = "analysis_end",
            run_id = %self.run_id,
            duration_ms = duration.num_milliseconds(),
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Analysis run ended"
        );
    }
}
