//! Generation Client - text-completion provider abstraction
//!
//! Provides the two operations the repair loop needs (draft and repair) and an
//! OpenAI-compatible implementation that also works against Ollama.

pub mod openai;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;
use diagram_common::{DraftResult, GenerationContext};

pub use openai::OpenAiGenerationClient;
pub use parse::parse_draft;

use crate::error::GenerationResult;

/// Everything the provider needs to correct a diagram that failed to render
#[derive(Debug, Clone, Copy)]
pub struct RepairRequest<'a> {
    pub context: &'a GenerationContext,
    pub prior_diagram: &'a str,
    pub error: &'a str,
    /// Keep the diagram's type (a flowchart stays a flowchart) and make the minimal edit
    pub preserve_diagram_type: bool,
}

impl<'a> RepairRequest<'a> {
    pub fn new(context: &'a GenerationContext, prior_diagram: &'a str, error: &'a str) -> Self {
        Self {
            context,
            prior_diagram,
            error,
            preserve_diagram_type: true,
        }
    }
}

/// Provider of diagram drafts.
///
/// Implementations degrade unparseable output to an empty draft and only
/// return `Err` for transport-level failures.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn draft(&self, context: &GenerationContext) -> GenerationResult<DraftResult>;

    async fn repair(&self, request: RepairRequest<'_>) -> GenerationResult<DraftResult>;
}
