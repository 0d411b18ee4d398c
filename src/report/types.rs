//! Data structures for the accident analysis report
//!
//! This module defines the report contract shared by every consumer: the
//! orchestrator produces it, the case store persists it and the exporters
//! render it. Field names on the wire follow the analysis model's schema
//! (camelCase JSON).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Optional report section.
///
/// The collaborator either produces a section (`Present`) or leaves it out
/// (`NotApplicable`). A missing or `null` field deserializes to
/// `NotApplicable`; nothing in this crate ever fills one in locally.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    /// Section produced by the analysis
    Present(T),
    /// Section not produced for this case
    NotApplicable,
}

impl<T> Section<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Section::Present(_))
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Section::NotApplicable)
    }

    /// Borrow the section data if present
    pub fn as_present(&self) -> Option<&T> {
        match self {
            Section::Present(value) => Some(value),
            Section::NotApplicable => None,
        }
    }
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Section::NotApplicable
    }
}

impl<T> From<Option<T>> for Section<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Section::Present(v),
            None => Section::NotApplicable,
        }
    }
}

impl<T: Serialize> Serialize for Section<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Section::Present(value) => value.serialize(serializer),
            Section::NotApplicable => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Section<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Section::from)
    }
}

/// Root of the forensic analysis contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Multi-paragraph forensic abstract
    pub executive_summary: String,
    /// Fault allocation
    pub liability: Liability,
    /// Speed and impact reconstruction
    pub physics: Physics,
    #[serde(default, skip_serializing_if = "Section::is_not_applicable")]
    pub human_impact: Section<HumanImpactAnalysis>,
    #[serde(default, skip_serializing_if = "Section::is_not_applicable")]
    pub driver_behavior: Section<DriverBehaviorAnalysis>,
    #[serde(default, skip_serializing_if = "Section::is_not_applicable")]
    pub environmental: Section<EnvironmentalAnalysis>,
    #[serde(default, skip_serializing_if = "Section::is_not_applicable")]
    pub audio_forensics: Section<AudioForensics>,
    #[serde(default, skip_serializing_if = "Section::is_not_applicable")]
    pub official_docs: Section<OfficialDocs>,
    /// Coverage determination
    pub insurance: Insurance,
    #[serde(default, skip_serializing_if = "Section::is_not_applicable")]
    pub ripple_effect: Section<RippleEffect>,
    #[serde(default, skip_serializing_if = "Section::is_not_applicable")]
    pub settlement_strategy: Section<SettlementStrategy>,
    /// Events relative to the moment of impact
    pub timeline_events: Vec<TimelineEvent>,
    /// Authenticity summary for the submitted media
    pub evidence_integrity: EvidenceIntegrity,
    /// What the report is grounded on
    #[serde(default, skip_serializing_if = "Provenance::is_unstated")]
    pub provenance: Provenance,
}

impl AnalysisReport {
    /// The built-in demonstration report, labelled as a placeholder.
    ///
    /// Used by the presentation layer when a case has no report anywhere.
    pub fn placeholder() -> Result<Self, serde_json::Error> {
        serde_json::from_str(PLACEHOLDER_REPORT_JSON)
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.provenance, Provenance::Simulated | Provenance::Placeholder)
    }
}

const PLACEHOLDER_REPORT_JSON: &str = include_str!("fixtures/placeholder_report.json");

/// Basis of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Derived from the supplied evidence
    Evidence,
    /// Hypothetical scenario generated because the evidence was unusable
    Simulated,
    /// Built-in demonstration data
    Placeholder,
    /// Collaborator did not say
    #[default]
    Unstated,
}

impl Provenance {
    pub fn is_unstated(&self) -> bool {
        matches!(self, Provenance::Unstated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Evidence => "evidence",
            Provenance::Simulated => "simulated",
            Provenance::Placeholder => "placeholder",
            Provenance::Unstated => "unstated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liability {
    pub plaintiff_percentage: f64,
    pub defendant_percentage: f64,
    pub rationale: String,
    /// Vehicle code section for the jurisdiction
    pub code_cited: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Physics {
    /// mph
    #[serde(rename = "vehicleA_speed")]
    pub vehicle_a_speed: f64,
    /// mph
    #[serde(rename = "vehicleB_speed")]
    pub vehicle_b_speed: f64,
    /// Degrees, 0-360
    pub impact_angle: f64,
    pub method: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanImpactAnalysis {
    pub seatbelt_status: SeatbeltStatus,
    /// Change in velocity (mph)
    pub delta_v: f64,
    /// Principal direction of force, e.g. "12 o'clock"
    pub principal_direction: String,
    /// Abbreviated Injury Scale (1-6)
    pub ais_score: f64,
    pub injury_probability: InjuryProbability,
    pub medical_consistency: MedicalConsistency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatbeltStatus {
    Confirmed,
    Unlikely,
    #[serde(rename = "Not Visible")]
    NotVisible,
}

impl SeatbeltStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatbeltStatus::Confirmed => "Confirmed",
            SeatbeltStatus::Unlikely => "Unlikely",
            SeatbeltStatus::NotVisible => "Not Visible",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryProbability {
    pub whiplash: f64,
    pub concussion: f64,
    pub fracture: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalConsistency {
    pub score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverBehaviorAnalysis {
    /// 100 is fully attentive
    pub attention_score: f64,
    /// Higher is worse relative to the population
    pub risk_percentile: f64,
    pub detected_actions: Vec<String>,
    pub driving_volatility: f64,
    pub court_recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalAnalysis {
    pub weather_condition: String,
    pub road_surface_condition: String,
    pub light_condition: String,
    /// 0.0 to 1.0 (about 0.7 dry, 0.4 wet)
    pub road_friction_coefficient: f64,
    /// mph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydroplaning_threshold_speed: Option<f64>,
    /// feet
    pub visibility_distance: f64,
    pub weather_contribution_percentage: f64,
    pub sun_glare: bool,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioForensics {
    pub transcript: String,
    pub speaker_sentiment: SpeakerSentiment,
    pub stress_levels: Vec<StressSample>,
    pub deception_indicators: Vec<String>,
    pub voice_signature_match: bool,
    pub background_noise_analysis: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeakerSentiment {
    Calm,
    Agitated,
    Deceptive,
    Traumatized,
    Neutral,
}

/// Microtremor stress level at a point in the recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressSample {
    pub timestamp: f64,
    /// 0-100
    pub level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialDocs {
    pub form_type: FormType,
    pub jurisdiction: String,
    pub generated_date: String,
    pub officer_narrative: String,
    pub party1_data: PartyData,
    pub party2_data: PartyData,
    pub blockchain_hash: String,
    pub qr_code_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormType {
    #[serde(rename = "TR-1")]
    Tr1,
    #[serde(rename = "MV-104AN")]
    Mv104an,
    Generic,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Tr1 => "TR-1",
            FormType::Mv104an => "MV-104AN",
            FormType::Generic => "Generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyData {
    pub name: String,
    pub license: String,
    pub vin: String,
    pub plate: String,
    pub insurance_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    pub status: InsuranceStatus,
    pub payout_estimate: f64,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsuranceStatus {
    Covered,
    Partial,
    Denied,
}

impl InsuranceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsuranceStatus::Covered => "Covered",
            InsuranceStatus::Partial => "Partial",
            InsuranceStatus::Denied => "Denied",
        }
    }
}

/// Multi-vehicle chain collision propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RippleEffect {
    pub is_multi_vehicle: bool,
    /// Vehicle that started the chain
    pub fault_origin: String,
    pub sequence: Vec<RippleSequenceItem>,
    pub subrogation_matrix: Vec<SubrogationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RippleSequenceItem {
    pub order: u32,
    pub source: String,
    pub target: String,
    /// e.g. "15kN"
    pub force_estimate: String,
    pub damage_description: String,
}

/// Inter-insurer payment obligation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubrogationItem {
    pub payer: String,
    pub payee: String,
    pub amount: f64,
    pub percentage: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementStrategy {
    pub policies: SettlementPolicies,
    pub calculation: SettlementCalculation,
    pub demand_letter: DemandLetter,
    pub email_draft: EmailDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPolicies {
    pub vehicle_a: PolicySummary,
    pub vehicle_b: PolicySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub carrier: String,
    pub policy_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_bodily_injury: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_property_damage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deductible: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementCalculation {
    pub total_damages: f64,
    pub liability_adjustment: f64,
    pub final_offer: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandLetter {
    pub recipient: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Seconds relative to impact (0.0)
    pub timestamp: f64,
    pub description: String,
    #[serde(rename = "type")]
    pub event_type: TimelineEventType,
    pub vehicle: VehicleRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEventType {
    Critical,
    Info,
    Impact,
}

impl TimelineEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineEventType::Critical => "Critical",
            TimelineEventType::Info => "Info",
            TimelineEventType::Impact => "Impact",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleRef {
    A,
    B,
    Both,
}

impl VehicleRef {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleRef::A => "A",
            VehicleRef::B => "B",
            VehicleRef::Both => "Both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceIntegrity {
    pub score: f64,
    pub certificate_id: String,
    pub checks: IntegrityChecks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityChecks {
    pub frame_duplication: bool,
    pub compression_artifacts: bool,
    pub gps_metadata: bool,
    pub audio_splicing: bool,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smallest report that satisfies the contract
    pub(crate) fn minimal_report_json() -> serde_json::Value {
        serde_json::json!({
            "executiveSummary": "Collision involving a Silver Toyota Camry and a Red Ducati Motorcycle. The sedan turned left across the motorcycle's path.",
            "liability": {
                "plaintiffPercentage": 20,
                "defendantPercentage": 80,
                "rationale": "At T-2s the sedan entered the intersection against the signal.",
                "codeCited": "CVC 21453"
            },
            "physics": {
                "vehicleA_speed": 38,
                "vehicleB_speed": 22,
                "impactAngle": 90,
                "method": "Conservation of Linear Momentum",
                "confidence": 81
            },
            "insurance": { "status": "Partial", "payoutEstimate": 48000, "notes": "Comparative fault applies." },
            "timelineEvents": [
                { "timestamp": -1.5, "description": "Sedan begins left turn", "type": "Critical", "vehicle": "A" },
                { "timestamp": 0.0, "description": "Impact", "type": "Impact", "vehicle": "Both" }
            ],
            "evidenceIntegrity": {
                "score": 95,
                "certificateId": "0xABCDEF",
                "checks": { "frameDuplication": true, "compressionArtifacts": true, "gpsMetadata": true, "audioSplicing": true }
            }
        })
    }

    pub(crate) fn minimal_report() -> AnalysisReport {
        serde_json::from_value(minimal_report_json()).expect("minimal report parses")
    }

    #[test]
    fn test_missing_optional_sections_are_not_applicable() {
        let report = minimal_report();
        assert!(report.human_impact.is_not_applicable());
        assert!(report.ripple_effect.is_not_applicable());
        assert!(report.settlement_strategy.is_not_applicable());
        assert_eq!(report.provenance, Provenance::Unstated);
    }

    #[test]
    fn test_null_section_is_not_applicable() {
        let mut value = minimal_report_json();
        value["environmental"] = serde_json::Value::Null;
        let report: AnalysisReport = serde_json::from_value(value).unwrap();
        assert!(report.environmental.is_not_applicable());
    }

    #[test]
    fn test_absent_sections_are_not_written_back() {
        let report = minimal_report();
        let value = serde_json::to_value(&report).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("humanImpact"));
        assert!(!object.contains_key("provenance"));
        assert_eq!(object.len(), 6);

        let reparsed: AnalysisReport = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed, report);
    }

    #[test]
    fn test_missing_mandatory_section_is_rejected() {
        let mut value = minimal_report_json();
        value.as_object_mut().unwrap().remove("physics");
        assert!(serde_json::from_value::<AnalysisReport>(value).is_err());
    }

    #[test]
    fn test_placeholder_report_is_complete() {
        let report = AnalysisReport::placeholder().expect("fixture parses");
        assert_eq!(report.provenance, Provenance::Placeholder);
        assert!(report.is_simulated());
        assert!(report.human_impact.is_present());
        assert!(report.driver_behavior.is_present());
        assert!(report.environmental.is_present());
        assert!(report.audio_forensics.is_present());
        assert!(report.official_docs.is_present());
        assert!(report.ripple_effect.is_present());
        assert!(report.settlement_strategy.is_present());
        assert_eq!(report.timeline_events.len(), 5);

        let docs = report.official_docs.as_present().unwrap();
        assert_eq!(docs.form_type, FormType::Tr1);
        let human = report.human_impact.as_present().unwrap();
        assert_eq!(human.seatbelt_status, SeatbeltStatus::Confirmed);
    }

    #[test]
    fn test_wire_names() {
        let value = serde_json::to_value(AnalysisReport::placeholder().unwrap()).unwrap();
        assert!(value["physics"].get("vehicleA_speed").is_some());
        assert!(value["officialDocs"].get("party1Data").is_some());
        assert_eq!(value["officialDocs"]["formType"], "TR-1");
        assert_eq!(value["settlementStrategy"]["policies"]["vehicleA"]["carrier"], "State Farm");
        assert_eq!(value["timelineEvents"][0]["type"], "Critical");
        assert_eq!(value["provenance"], "placeholder");
    }
}
