//! Immutable analysis request
//!
//! Built once from the validated queue. Payload bytes are shared (`Arc`), so
//! cloning a request for a retry never re-reads or copies evidence.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::{AnalysisError, AnalysisResult};
use crate::audit;
use crate::evidence::{magic, EvidenceItem, MediaKind};

/// Jurisdiction used when the operator has not picked one
pub const DEFAULT_JURISDICTION: &str = "California";

/// Physics reconstruction preference passed to the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PhysicsMethod {
    #[default]
    AutoDetect,
    Momentum,
    CrushEnergy,
    SkidAnalysis,
    /// Any other named method
    Custom(String),
}

impl PhysicsMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PhysicsMethod::AutoDetect => "Auto-Detect",
            PhysicsMethod::Momentum => "Conservation of Linear Momentum",
            PhysicsMethod::CrushEnergy => "Crush Energy Analysis",
            PhysicsMethod::SkidAnalysis => "Skid Mark Analysis",
            PhysicsMethod::Custom(name) => name,
        }
    }
}

impl fmt::Display for PhysicsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhysicsMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "" | "auto" | "auto-detect" | "autodetect" => PhysicsMethod::AutoDetect,
            "momentum" | "conservation of linear momentum" => PhysicsMethod::Momentum,
            "crush" | "crush energy" | "crush energy analysis" => PhysicsMethod::CrushEnergy,
            "skid" | "skid mark analysis" | "skid analysis" => PhysicsMethod::SkidAnalysis,
            _ => PhysicsMethod::Custom(s.trim().to_string()),
        })
    }
}

impl From<String> for PhysicsMethod {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(method) => method,
            Err(never) => match never {},
        }
    }
}

impl From<PhysicsMethod> for String {
    fn from(value: PhysicsMethod) -> Self {
        value.as_str().to_string()
    }
}

/// Whether the model may answer with a hypothetical report.
///
/// Off unless configured explicitly; every request made with it on is logged
/// to the forensic audit trail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    Disallow,
    AllowSimulated,
}

impl FallbackPolicy {
    pub fn allows_simulated(&self) -> bool {
        matches!(self, FallbackPolicy::AllowSimulated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackPolicy::Disallow => "disallow",
            FallbackPolicy::AllowSimulated => "allow_simulated",
        }
    }
}

/// One content-addressed evidence payload
#[derive(Debug, Clone)]
pub struct EvidencePart {
    pub evidence_id: String,
    pub name: String,
    pub kind: MediaKind,
    pub mime: String,
    /// `sha256:<hex>`
    pub digest: String,
    pub bytes: Arc<[u8]>,
}

impl EvidencePart {
    pub fn from_bytes(evidence_id: impl Into<String>, name: impl Into<String>, kind: MediaKind, mime: Option<&str>, bytes: Arc<[u8]>) -> Self {
        let name = name.into();
        let header = &bytes[..bytes.len().min(32)];
        let mime = mime
            .map(str::to_string)
            .unwrap_or_else(|| magic::sniff_mime(header, &name).to_string());
        Self {
            evidence_id: evidence_id.into(),
            digest: content_address(&bytes),
            name,
            kind,
            mime,
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }
}

/// `sha256:<hex>` digest of a payload
pub fn content_address(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Snapshot handed to the analysis provider
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    parts: Vec<EvidencePart>,
    jurisdiction: String,
    physics_method: PhysicsMethod,
    fallback: FallbackPolicy,
}

impl AnalysisRequest {
    pub fn new(parts: Vec<EvidencePart>, jurisdiction: impl Into<String>, physics_method: PhysicsMethod, fallback: FallbackPolicy) -> Self {
        Self {
            parts,
            jurisdiction: jurisdiction.into(),
            physics_method,
            fallback,
        }
    }

    /// Read every queued payload, in queue order
    pub async fn build(
        items: &[EvidenceItem],
        jurisdiction: &str,
        physics_method: PhysicsMethod,
        fallback: FallbackPolicy,
        max_payload_bytes: Option<u64>,
    ) -> AnalysisResult<Self> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let name = item.name();
            let bytes = item
                .source
                .read()
                .await
                .map_err(|source| AnalysisError::EvidenceUnavailable { name: name.clone(), source })?;

            if let Some(limit) = max_payload_bytes {
                let size = bytes.len() as u64;
                if size > limit {
                    return Err(AnalysisError::PayloadTooLarge { name, size, limit });
                }
            }

            let part = EvidencePart::from_bytes(&item.id, name, item.kind, item.source.declared_mime(), bytes);
            audit::log_evidence_read(&part.evidence_id, &part.name, &part.mime, part.size(), &part.digest);
            parts.push(part);
        }

        Ok(Self::new(parts, jurisdiction, physics_method, fallback))
    }

    pub fn parts(&self) -> &[EvidencePart] {
        &self.parts
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn physics_method(&self) -> &PhysicsMethod {
        &self.physics_method
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    pub fn total_bytes(&self) -> usize {
        self.parts.iter().map(EvidencePart::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{EvidenceQueue, EvidenceSource};

    #[test]
    fn test_physics_method_parse() {
        assert_eq!("Auto-Detect".parse::<PhysicsMethod>().unwrap(), PhysicsMethod::AutoDetect);
        assert_eq!("momentum".parse::<PhysicsMethod>().unwrap(), PhysicsMethod::Momentum);
        assert_eq!(
            "Photogrammetry".parse::<PhysicsMethod>().unwrap(),
            PhysicsMethod::Custom("Photogrammetry".into())
        );
        assert_eq!(PhysicsMethod::default().to_string(), "Auto-Detect");
    }

    #[test]
    fn test_content_address() {
        assert_eq!(
            content_address(b"abc"),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_part_sniffs_mime_and_encodes() {
        let part = EvidencePart::from_bytes("ev-1", "scene.bin", MediaKind::Video, None, Arc::from(&[0xFFu8, 0xD8, 0xFF][..]));
        assert_eq!(part.mime, "image/jpeg");
        assert_eq!(part.data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[tokio::test]
    async fn test_build_reads_in_queue_order() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("front.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let mut queue = EvidenceQueue::new();
        queue.add([EvidenceSource::file(&video)], MediaKind::Video);
        queue.add([EvidenceSource::inline("call.wav", b"RIFF\0\0\0\0WAVEfmt ".to_vec())], MediaKind::Audio);

        let request = AnalysisRequest::build(queue.items(), "Texas", PhysicsMethod::Momentum, FallbackPolicy::Disallow, None)
            .await
            .unwrap();
        assert_eq!(request.parts().len(), 2);
        assert_eq!(request.parts()[0].name, "front.mp4");
        assert_eq!(request.parts()[0].mime, "video/mp4");
        assert_eq!(request.parts()[1].mime, "audio/wav");
        assert_eq!(request.jurisdiction(), "Texas");
        assert_eq!(request.parts()[0].digest, content_address(b"not really a video"));
    }

    #[tokio::test]
    async fn test_build_enforces_size_limit() {
        let mut queue = EvidenceQueue::new();
        queue.add([EvidenceSource::inline("big.mp4", vec![0u8; 64])], MediaKind::Video);
        let err = AnalysisRequest::build(queue.items(), "Texas", PhysicsMethod::AutoDetect, FallbackPolicy::Disallow, Some(16))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::PayloadTooLarge { size: 64, limit: 16, .. }));
    }
}
