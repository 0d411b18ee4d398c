//! Standard evidence checks
//!
//! These stand in for real forensic verification: each waits a fixed delay,
//! then confirms every queued item is still readable. A check with no
//! applicable evidence ends in a warning rather than passing silently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CheckOutcome, Checker};
use crate::evidence::{EvidenceItem, MediaKind};

/// `(id, label, media the check applies to)` in pipeline order
pub const STANDARD_CHECKS: [(&str, &str, &[MediaKind]); 5] = [
    ("frame", "Video Frame Duplication Check", &[MediaKind::Video]),
    ("compression", "Compression Artifact Analysis", &[MediaKind::Video]),
    ("gps", "GPS Metadata Tamper Check", &[MediaKind::Video]),
    ("audio", "Audio Spectrum / Splicing Detection", &[MediaKind::Audio]),
    ("voice", "Voice Biometrics & Stress Baseline", &[MediaKind::Audio]),
];

pub fn standard_checks(delay: Duration) -> Vec<Arc<dyn Checker>> {
    STANDARD_CHECKS
        .iter()
        .map(|(id, label, kinds)| {
            Arc::new(SimulatedCheck::new(*id, *label, kinds.to_vec(), delay)) as Arc<dyn Checker>
        })
        .collect()
}

/// Fixed-delay availability check over one or more media kinds
#[derive(Debug, Clone)]
pub struct SimulatedCheck {
    id: String,
    label: String,
    applies_to: Vec<MediaKind>,
    delay: Duration,
}

impl SimulatedCheck {
    pub fn new(id: impl Into<String>, label: impl Into<String>, applies_to: Vec<MediaKind>, delay: Duration) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            applies_to,
            delay,
        }
    }
}

#[async_trait]
impl Checker for SimulatedCheck {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn check(&self, items: &[EvidenceItem]) -> CheckOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        // Any vanished item aborts, whatever media this check covers
        for item in items {
            if !item.source.is_available().await {
                return CheckOutcome::Error(format!("Evidence '{}' is no longer available", item.name()));
            }
        }

        if !items.iter().any(|item| self.applies_to.contains(&item.kind)) {
            let kinds: Vec<&str> = self.applies_to.iter().map(|k| k.as_str()).collect();
            return CheckOutcome::Warning(format!("No {} evidence submitted", kinds.join("/")));
        }

        CheckOutcome::Valid
    }
}
