//! Figures derived from a finished report
//!
//! The presentation layer plots these; they are computed here so every
//! consumer gets the same numbers.

use serde::Serialize;

use super::types::{AnalysisReport, EnvironmentalAnalysis};

/// Horne's constant for the dynamic hydroplaning speed (mph per sqrt(psi))
pub const HORNE_CONSTANT: f64 = 10.35;

/// Tire pressure assumed when the operator has not supplied one
pub const DEFAULT_TIRE_PRESSURE_PSI: f64 = 32.0;

/// Dynamic hydroplaning speed in mph for a tire inflated to `psi`.
///
/// Horne's formula: `Vp = 10.35 * sqrt(P)`.
pub fn hydroplaning_threshold_mph(psi: f64) -> f64 {
    HORNE_CONSTANT * psi.max(0.0).sqrt()
}

/// Environmental risk factors on a 0-100 scale where 100 is high risk
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalRiskProfile {
    pub friction_loss: f64,
    pub visibility_impairment: f64,
    pub hydroplaning_potential: f64,
    pub light_deficiency: f64,
    pub severity_contribution: f64,
}

impl EnvironmentalRiskProfile {
    pub fn from_analysis(env: &EnvironmentalAnalysis) -> Self {
        // 0.9 is a dry road, anything at or above it carries no friction risk
        let friction_loss = clamp_percent((0.9 - env.road_friction_coefficient) * 125.0);
        // 1000 ft or more is unimpaired
        let visibility_impairment = clamp_percent((1000.0 - env.visibility_distance) / 10.0);
        let hydroplaning_potential = env
            .hydroplaning_threshold_speed
            .map(|threshold| clamp_percent((75.0 - threshold) * 2.5))
            .unwrap_or(0.0);
        let light_deficiency = if env.light_condition.contains("Night") { 80.0 } else { 20.0 };

        Self {
            friction_loss,
            visibility_impairment,
            hydroplaning_potential,
            light_deficiency,
            severity_contribution: clamp_percent(env.weather_contribution_percentage),
        }
    }

    /// Labelled axes in plotting order
    pub fn axes(&self) -> [(&'static str, f64); 5] {
        [
            ("Friction Loss", self.friction_loss),
            ("Visibility Impairment", self.visibility_impairment),
            ("Hydroplaning Potential", self.hydroplaning_potential),
            ("Light Deficiency", self.light_deficiency),
            ("Severity Contribution", self.severity_contribution),
        ]
    }
}

/// Result of comparing vehicle A's speed against the hydroplaning limit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydroplaningAssessment {
    pub tire_pressure_psi: f64,
    pub threshold_mph: f64,
    pub vehicle_speed_mph: f64,
    pub exceeds_threshold: bool,
}

impl AnalysisReport {
    /// Risk profile for the environmental section, if the analysis produced one
    pub fn environmental_risk(&self) -> Option<EnvironmentalRiskProfile> {
        self.environmental
            .as_present()
            .map(EnvironmentalRiskProfile::from_analysis)
    }

    /// Check vehicle A's reconstructed speed against Horne's limit
    pub fn hydroplaning_assessment(&self, tire_pressure_psi: f64) -> HydroplaningAssessment {
        let threshold_mph = hydroplaning_threshold_mph(tire_pressure_psi);
        HydroplaningAssessment {
            tire_pressure_psi,
            threshold_mph,
            vehicle_speed_mph: self.physics.vehicle_a_speed,
            exceeds_threshold: self.physics.vehicle_a_speed > threshold_mph,
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
