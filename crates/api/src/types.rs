//! Request and response bodies for the HTTP API

use chrono::{DateTime, Utc};
use diagram_common::{ChatTurn, ConnectionId, GenerationContext};
use diagram_repair::GenerationRequest;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to generate (or edit) a diagram
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// What the user wants drawn or changed
    pub prompt: String,

    /// Prior conversation, oldest first
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,

    /// Diagram currently shown to the user, if any
    #[serde(default)]
    pub current_diagram: Option<String>,

    /// Render connection announced on `/render`; validation targets only this client
    #[serde(default)]
    pub connection_id: Option<ConnectionId>,

    /// Set to `false` to skip render validation
    #[serde(default = "default_validate")]
    pub validate: bool,
}

fn default_validate() -> bool {
    true
}

impl GenerateRequest {
    pub fn into_generation_request(self) -> GenerationRequest {
        let mut context = GenerationContext::new(self.prompt).with_history(self.chat_history);
        if let Some(diagram) = self.current_diagram {
            context = context.with_current_diagram(diagram);
        }

        GenerationRequest {
            context,
            connection: self.connection_id,
            validate: self.validate,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status
    pub status: String,

    pub version: String,

    /// Live render connections
    pub render_connections: usize,

    /// Validations waiting for a verdict
    pub pending_validations: usize,

    /// Timestamp of health check
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    pub code: Option<String>,

    /// Timestamp of error
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
            timestamp: Utc::now(),
        }
    }
}
