//! Schema conformance checks for analysis reports
//!
//! Deserialization already guarantees every mandatory section is present.
//! These checks cover what the type system cannot: blank narrative fields,
//! percentages outside [0, 100] and an implausible liability split.

use super::types::{AnalysisReport, Section};

/// Tolerance around 100% for the plaintiff/defendant split
pub const LIABILITY_SPLIT_RANGE: (f64, f64) = (99.0, 101.0);

/// How serious a conformance issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Report must be rejected
    Violation,
    /// Report is usable but the operator should be told
    Advisory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConformanceIssue {
    /// JSON path of the offending field
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl std::fmt::Display for ConformanceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of checking a report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConformanceReport {
    pub issues: Vec<ConformanceIssue>,
}

impl ConformanceReport {
    pub fn is_conformant(&self) -> bool {
        self.violations().next().is_none()
    }

    pub fn violations(&self) -> impl Iterator<Item = &ConformanceIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Violation)
    }

    pub fn advisories(&self) -> impl Iterator<Item = &ConformanceIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Advisory)
    }

    fn violation(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ConformanceIssue {
            field: field.into(),
            message: message.into(),
            severity: Severity::Violation,
        });
    }

    fn advisory(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ConformanceIssue {
            field: field.into(),
            message: message.into(),
            severity: Severity::Advisory,
        });
    }

    fn percent(&mut self, field: &str, value: f64) {
        if !(0.0..=100.0).contains(&value) {
            self.violation(field, format!("{} is outside 0-100", value));
        }
    }

    fn non_blank(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.violation(field, "must not be empty");
        }
    }
}

impl AnalysisReport {
    /// Check the report against the contract rules
    pub fn check_conformance(&self) -> ConformanceReport {
        let mut report = ConformanceReport::default();

        report.non_blank("executiveSummary", &self.executive_summary);
        report.non_blank("liability.rationale", &self.liability.rationale);
        report.non_blank("physics.method", &self.physics.method);

        report.percent("liability.plaintiffPercentage", self.liability.plaintiff_percentage);
        report.percent("liability.defendantPercentage", self.liability.defendant_percentage);
        let split = self.liability.plaintiff_percentage + self.liability.defendant_percentage;
        if !(LIABILITY_SPLIT_RANGE.0..=LIABILITY_SPLIT_RANGE.1).contains(&split) {
            report.advisory(
                "liability",
                format!("plaintiff and defendant percentages sum to {}", split),
            );
        }

        report.percent("physics.confidence", self.physics.confidence);
        report.percent("evidenceIntegrity.score", self.evidence_integrity.score);

        if let Section::Present(human) = &self.human_impact {
            report.percent("humanImpact.injuryProbability.whiplash", human.injury_probability.whiplash);
            report.percent("humanImpact.injuryProbability.concussion", human.injury_probability.concussion);
            report.percent("humanImpact.injuryProbability.fracture", human.injury_probability.fracture);
            report.percent("humanImpact.medicalConsistency.score", human.medical_consistency.score);
        }

        if let Section::Present(driver) = &self.driver_behavior {
            report.percent("driverBehavior.attentionScore", driver.attention_score);
            report.percent("driverBehavior.riskPercentile", driver.risk_percentile);
            report.percent("driverBehavior.drivingVolatility", driver.driving_volatility);
        }

        if let Section::Present(env) = &self.environmental {
            report.percent(
                "environmental.weatherContributionPercentage",
                env.weather_contribution_percentage,
            );
            if !(0.0..=1.0).contains(&env.road_friction_coefficient) {
                report.violation(
                    "environmental.roadFrictionCoefficient",
                    format!("{} is outside 0.0-1.0", env.road_friction_coefficient),
                );
            }
        }

        if let Section::Present(audio) = &self.audio_forensics {
            for (i, sample) in audio.stress_levels.iter().enumerate() {
                report.percent(&format!("audioForensics.stressLevels[{}].level", i), sample.level);
            }
        }

        if let Section::Present(ripple) = &self.ripple_effect {
            for (i, item) in ripple.subrogation_matrix.iter().enumerate() {
                report.percent(&format!("rippleEffect.subrogationMatrix[{}].percentage", i), item.percentage);
            }
        }

        report
    }
}
