//! Structured-output schema for the analysis model
//!
//! JSON Schema mirror of [`crate::report::AnalysisReport`]. Optional sections
//! are nullable so the model can mark them not applicable instead of padding
//! them with zeros.

use serde_json::{json, Value};

/// Mandatory top-level sections
pub const MANDATORY_SECTIONS: [&str; 6] = [
    "executiveSummary",
    "liability",
    "physics",
    "insurance",
    "timelineEvents",
    "evidenceIntegrity",
];

/// Optional top-level sections
pub const OPTIONAL_SECTIONS: [&str; 7] = [
    "humanImpact",
    "driverBehavior",
    "environmental",
    "audioForensics",
    "officialDocs",
    "rippleEffect",
    "settlementStrategy",
];

fn percent(description: &str) -> Value {
    json!({ "type": "number", "minimum": 0, "maximum": 100, "description": description })
}

fn number(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn string_enum(values: &[&str]) -> Value {
    json!({ "type": "string", "enum": values })
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

/// Same object, but `null` is also accepted
fn nullable(mut schema: Value) -> Value {
    schema["type"] = json!(["object", "null"]);
    schema
}

fn party() -> Value {
    object(
        json!({
            "name": string(""),
            "license": string(""),
            "vin": string(""),
            "plate": string(""),
            "insuranceCode": string("")
        }),
        &["name", "license", "vin", "plate", "insuranceCode"],
    )
}

fn policy() -> Value {
    object(
        json!({
            "carrier": string(""),
            "policyNumber": string(""),
            "limitBodilyInjury": number("USD"),
            "limitPropertyDamage": number("USD"),
            "deductible": number("USD"),
            "status": string("")
        }),
        &["carrier", "policyNumber", "status"],
    )
}

/// Full response schema for a jurisdiction
pub fn response_schema(jurisdiction: &str) -> Value {
    let liability = object(
        json!({
            "plaintiffPercentage": percent("Plaintiff fault share"),
            "defendantPercentage": percent("Defendant fault share; the two shares sum to 100"),
            "rationale": string("Legal argument tied to specific frames or visual evidence and to the statute"),
            "codeCited": string(&format!("Specific {} Vehicle Code section", jurisdiction))
        }),
        &["plaintiffPercentage", "defendantPercentage", "rationale", "codeCited"],
    );

    let physics = object(
        json!({
            "vehicleA_speed": number("Speed in mph"),
            "vehicleB_speed": number("Speed in mph"),
            "impactAngle": number("Angle 0-360 degrees"),
            "method": string("e.g. 'Conservation of Linear Momentum' or 'Crush Energy Analysis'"),
            "confidence": percent("Confidence based on evidence clarity")
        }),
        &["vehicleA_speed", "vehicleB_speed", "impactAngle", "method", "confidence"],
    );

    let human_impact = nullable(object(
        json!({
            "seatbeltStatus": string_enum(&["Confirmed", "Unlikely", "Not Visible"]),
            "deltaV": number("Change in velocity (mph)"),
            "principalDirection": string("PDOF, e.g. '11 o'clock'"),
            "aisScore": number("Abbreviated Injury Scale (1-6)"),
            "injuryProbability": object(
                json!({ "whiplash": percent(""), "concussion": percent(""), "fracture": percent("") }),
                &["whiplash", "concussion", "fracture"]
            ),
            "medicalConsistency": object(
                json!({ "score": percent(""), "rationale": string("Correlate forces with injury patterns") }),
                &["score", "rationale"]
            )
        }),
        &["seatbeltStatus", "deltaV", "principalDirection", "aisScore", "injuryProbability", "medicalConsistency"],
    ));

    let driver_behavior = nullable(object(
        json!({
            "attentionScore": percent("100 is fully attentive"),
            "riskPercentile": percent("Higher is worse"),
            "detectedActions": { "type": "array", "items": { "type": "string" } },
            "drivingVolatility": percent(""),
            "courtRecommendation": string("Formal risk assessment for the court"),
            "identityMatch": string("")
        }),
        &["attentionScore", "riskPercentile", "detectedActions", "drivingVolatility", "courtRecommendation"],
    ));

    let environmental = nullable(object(
        json!({
            "weatherCondition": string(""),
            "roadSurfaceCondition": string(""),
            "lightCondition": string(""),
            "roadFrictionCoefficient": { "type": "number", "minimum": 0, "maximum": 1, "description": "About 0.7 dry, 0.4 wet" },
            "hydroplaningThresholdSpeed": number("mph"),
            "visibilityDistance": number("feet"),
            "weatherContributionPercentage": percent(""),
            "sunGlare": { "type": "boolean" },
            "notes": string("")
        }),
        &[
            "weatherCondition",
            "roadSurfaceCondition",
            "lightCondition",
            "roadFrictionCoefficient",
            "visibilityDistance",
            "weatherContributionPercentage",
            "sunGlare",
            "notes",
        ],
    ));

    let audio_forensics = nullable(object(
        json!({
            "transcript": string(""),
            "speakerSentiment": string_enum(&["Calm", "Agitated", "Deceptive", "Traumatized", "Neutral"]),
            "stressLevels": {
                "type": "array",
                "items": object(
                    json!({ "timestamp": number("seconds"), "level": percent(""), "trigger": string("") }),
                    &["timestamp", "level"]
                )
            },
            "deceptionIndicators": { "type": "array", "items": { "type": "string" } },
            "voiceSignatureMatch": { "type": "boolean" },
            "backgroundNoiseAnalysis": string("")
        }),
        &[
            "transcript",
            "speakerSentiment",
            "stressLevels",
            "deceptionIndicators",
            "voiceSignatureMatch",
            "backgroundNoiseAnalysis",
        ],
    ));

    let official_docs = nullable(object(
        json!({
            "formType": string_enum(&["TR-1", "MV-104AN", "Generic"]),
            "jurisdiction": string(""),
            "generatedDate": string("YYYY-MM-DD"),
            "officerNarrative": string("Objective police narrative using V1/V2 and NB/SB notation"),
            "party1Data": party(),
            "party2Data": party(),
            "blockchainHash": string(""),
            "qrCodeUrl": string("")
        }),
        &[
            "formType",
            "jurisdiction",
            "generatedDate",
            "officerNarrative",
            "party1Data",
            "party2Data",
            "blockchainHash",
            "qrCodeUrl",
        ],
    ));

    let insurance = object(
        json!({
            "status": string_enum(&["Covered", "Partial", "Denied"]),
            "payoutEstimate": number("USD"),
            "notes": string("")
        }),
        &["status", "payoutEstimate", "notes"],
    );

    let ripple_effect = nullable(object(
        json!({
            "isMultiVehicle": { "type": "boolean" },
            "faultOrigin": string("Vehicle that started the chain"),
            "sequence": {
                "type": "array",
                "items": object(
                    json!({
                        "order": { "type": "integer" },
                        "source": string(""),
                        "target": string(""),
                        "forceEstimate": string("e.g. '15kN'"),
                        "damageDescription": string("")
                    }),
                    &["order", "source", "target", "forceEstimate", "damageDescription"]
                )
            },
            "subrogationMatrix": {
                "type": "array",
                "items": object(
                    json!({
                        "payer": string(""),
                        "payee": string(""),
                        "amount": number("USD"),
                        "percentage": percent(""),
                        "rationale": string("")
                    }),
                    &["payer", "payee", "amount", "percentage", "rationale"]
                )
            }
        }),
        &["isMultiVehicle", "faultOrigin", "sequence", "subrogationMatrix"],
    ));

    let settlement_strategy = nullable(object(
        json!({
            "policies": object(json!({ "vehicleA": policy(), "vehicleB": policy() }), &["vehicleA", "vehicleB"]),
            "calculation": object(
                json!({ "totalDamages": number("USD"), "liabilityAdjustment": number("USD"), "finalOffer": number("USD") }),
                &["totalDamages", "liabilityAdjustment", "finalOffer"]
            ),
            "demandLetter": object(json!({ "recipient": string(""), "content": string("") }), &["recipient", "content"]),
            "emailDraft": object(
                json!({ "to": string(""), "subject": string(""), "body": string("") }),
                &["to", "subject", "body"]
            )
        }),
        &["policies", "calculation", "demandLetter", "emailDraft"],
    ));

    let timeline_events = json!({
        "type": "array",
        "items": object(
            json!({
                "timestamp": number("Seconds relative to impact (0.0)"),
                "description": string(""),
                "type": string_enum(&["Critical", "Info", "Impact"]),
                "vehicle": string_enum(&["A", "B", "Both"])
            }),
            &["timestamp", "description", "type", "vehicle"]
        )
    });

    let evidence_integrity = object(
        json!({
            "score": percent(""),
            "certificateId": string(""),
            "checks": object(
                json!({
                    "frameDuplication": { "type": "boolean" },
                    "compressionArtifacts": { "type": "boolean" },
                    "gpsMetadata": { "type": "boolean" },
                    "audioSplicing": { "type": "boolean" }
                }),
                &["frameDuplication", "compressionArtifacts", "gpsMetadata", "audioSplicing"]
            )
        }),
        &["score", "certificateId", "checks"],
    );

    let mut required: Vec<&str> = MANDATORY_SECTIONS.to_vec();
    required.push("provenance");

    object(
        json!({
            "executiveSummary": string(
                "Multi-paragraph forensic abstract. Starts by naming the vehicle types, then covers \
                 pre-crash trajectory, point of impact and rest positions"
            ),
            "liability": liability,
            "physics": physics,
            "humanImpact": human_impact,
            "driverBehavior": driver_behavior,
            "environmental": environmental,
            "audioForensics": audio_forensics,
            "officialDocs": official_docs,
            "insurance": insurance,
            "rippleEffect": ripple_effect,
            "settlementStrategy": settlement_strategy,
            "timelineEvents": timeline_events,
            "evidenceIntegrity": evidence_integrity,
            "provenance": {
                "type": "string",
                "enum": ["evidence", "simulated"],
                "description": "'evidence' when grounded in the supplied media, 'simulated' for a hypothetical scenario"
            }
        }),
        &required,
    )
}
