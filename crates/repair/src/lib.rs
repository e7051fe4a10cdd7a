//! Diagram repair: render-validated generation with bounded self-correction
//!
//! This crate provides the generation-validation-repair loop:
//! - Sanitizing provider output into plain diagram source
//! - Correlating asynchronous render verdicts with the requests that caused them
//! - Addressing exactly one connected render client per validation
//! - Driving draft → validate → fix cycles under a fixed retry budget

pub mod channel;
pub mod correlator;
pub mod error;
pub mod events;
pub mod generation;
pub mod orchestrator;
pub mod sanitizer;
pub mod validation;

// Re-exports
pub use channel::{ConnectionRegistry, InboundMessage, OutboundMessage, RenderChannel};
pub use correlator::{PendingVerdict, ValidationCorrelator};
pub use error::{ChannelError, GenerationError};
pub use events::RepairEvent;
pub use generation::{GenerationClient, OpenAiGenerationClient, RepairRequest};
pub use orchestrator::{GenerationRequest, RepairOrchestrator};
pub use sanitizer::sanitize_code;
pub use validation::RemoteValidator;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
