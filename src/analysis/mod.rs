//! AI analysis
//!
//! Request building, the provider seam, the directive and response schema
//! handed to the model, and the orchestrator state machine that ties intake,
//! validation and the provider call together.
//!
//! ```rust,ignore
//! use accident_analytics_lib::analysis::{AnalysisOrchestrator, OrchestratorSettings};
//!
//! let mut orchestrator = AnalysisOrchestrator::new(provider, OrchestratorSettings::default());
//! orchestrator.begin_case("California")?;
//! orchestrator.add_evidence([EvidenceSource::file("dashcam.mp4")], MediaKind::Video)?;
//! let report = orchestrator.run().await?;
//! let case = orchestrator.commit(&store).await?;
//! ```

pub mod error;
pub mod request;
pub mod schema;
pub mod prompt;
pub mod provider;
pub mod orchestrator;

pub use error::{AnalysisError, AnalysisResult, ANALYSIS_FAILED_MESSAGE};
pub use request::{content_address, AnalysisRequest, EvidencePart, FallbackPolicy, PhysicsMethod, DEFAULT_JURISDICTION};
pub use prompt::{DirectiveRenderer, CHAT_FALLBACK_REPLY, CHAT_SYSTEM_PROMPT};
pub use provider::{decode_report, unwrap_response, AnalysisProvider};
pub use orchestrator::{
    AnalysisEvent, AnalysisOrchestrator, AnalysisState, CommittedCase, OrchestratorSettings,
    STATUS_FINALIZING, STATUS_UPLOADING,
};
