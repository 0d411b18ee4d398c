//! Analysis directive rendering
//!
//! The directive (persona, phases, section rules, fallback policy and the
//! response schema) is a Tera template so wording can change without code.

use serde::Serialize;
use tera::{Context, Tera};

use super::error::AnalysisResult;
use super::request::{AnalysisRequest, EvidencePart};
use super::schema::response_schema;

const DIRECTIVE_TEMPLATE: &str = include_str!("templates/directive.txt");
const DIRECTIVE_NAME: &str = "directive.txt";

/// System prompt for the conversational assistant
pub const CHAT_SYSTEM_PROMPT: &str = "You are AccidentAnalytics AI, a multilingual forensic expert. \
Detect the user's language and respond in that same language. Answer questions about accident \
reconstruction, liability laws, and physics calculations. Be precise, professional, and concise. \
Do not give binding legal advice, but cite relevant codes.";

/// Reply used whenever the assistant cannot answer
pub const CHAT_FALLBACK_REPLY: &str =
    "I encountered an error accessing the forensic database. Please try again.";

#[derive(Serialize)]
struct PartContext<'a> {
    name: &'a str,
    kind: &'a str,
    mime: &'a str,
    size: usize,
    digest: &'a str,
    inline: bool,
}

/// Renders the analysis directive
pub struct DirectiveRenderer {
    tera: Tera,
}

impl DirectiveRenderer {
    pub fn new() -> AnalysisResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(DIRECTIVE_NAME, DIRECTIVE_TEMPLATE)?;
        Ok(Self { tera })
    }

    /// Replace the built-in directive wording
    pub fn with_template(template: &str) -> AnalysisResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(DIRECTIVE_NAME, template)?;
        Ok(Self { tera })
    }

    /// Render for `request`; `attached` says which parts the provider sends as content
    pub fn render(&self, request: &AnalysisRequest, attached: impl Fn(&EvidencePart) -> bool) -> AnalysisResult<String> {
        let evidence: Vec<PartContext<'_>> = request
            .parts()
            .iter()
            .map(|part| PartContext {
                name: &part.name,
                kind: part.kind.as_str(),
                mime: &part.mime,
                size: part.size(),
                digest: &part.digest,
                inline: attached(part),
            })
            .collect();

        let schema = serde_json::to_string_pretty(&response_schema(request.jurisdiction()))?;

        let mut context = Context::new();
        context.insert("jurisdiction", request.jurisdiction());
        context.insert("physics_method", request.physics_method().as_str());
        context.insert("allow_simulated", &request.fallback().allows_simulated());
        context.insert("evidence", &evidence);
        context.insert("schema", &schema);

        Ok(self.tera.render(DIRECTIVE_NAME, &context)?)
    }
}
