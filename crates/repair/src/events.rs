//! Progress events pushed to the originating render client

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RepairEvent {
    /// Asking the provider for the first draft
    Drafting,
    /// Candidate sent to the render client
    Validating { attempt: u32 },
    /// The render client rejected the candidate
    ValidationFailed { attempt: u32, error: String },
    /// Asking the provider for a corrected candidate
    Fixing { attempt: u32 },
    /// Loop finished
    Completed { success: bool, attempts: u32 },
}
