use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token tying one outbound validation request to its inbound verdict.
///
/// Unique across every outstanding request in the process, not just per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one connected render client (a browser tab)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One recorded exchange in the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the generation provider sees for one top-level request.
///
/// Supplied fresh per request; nothing in the repair loop persists it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    /// The user's current request
    pub prompt: String,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Diagram currently on screen; empty when none exists yet
    #[serde(default)]
    pub current_diagram: String,
}

impl GenerationContext {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            current_diagram: String::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_current_diagram(mut self, diagram: impl Into<String>) -> Self {
        self.current_diagram = diagram.into();
        self
    }

    pub fn has_current_diagram(&self) -> bool {
        !self.current_diagram.trim().is_empty()
    }
}

/// Candidate diagram plus its natural-language explanation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResult {
    pub diagram_source: String,
    pub explanation: String,
}

impl DraftResult {
    pub fn new(diagram_source: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            diagram_source: diagram_source.into(),
            explanation: explanation.into(),
        }
    }

    /// Draft the provider produced but that could not be parsed
    pub fn empty(explanation: impl Into<String>) -> Self {
        Self {
            diagram_source: String::new(),
            explanation: explanation.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diagram_source.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub correlation_id: CorrelationId,
    pub diagram_source: String,
}

impl ValidationRequest {
    /// Create a request with a fresh correlation id
    pub fn new(diagram_source: impl Into<String>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            diagram_source: diagram_source.into(),
        }
    }
}

/// Which path settled a pending validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOrigin {
    /// The render client reported a result
    #[default]
    Client,
    /// No verdict arrived inside the validation window
    TimedOut,
    /// The target connection could not be addressed
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub correlation_id: CorrelationId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub origin: VerdictOrigin,
}

impl ValidationVerdict {
    pub fn passed(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            success: true,
            error: None,
            origin: VerdictOrigin::Client,
        }
    }

    pub fn failed(correlation_id: CorrelationId, error: impl Into<String>) -> Self {
        Self {
            correlation_id,
            success: false,
            error: Some(error.into()),
            origin: VerdictOrigin::Client,
        }
    }

    /// Optimistic resolution after the validation window elapsed
    pub fn timed_out(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            success: true,
            error: None,
            origin: VerdictOrigin::TimedOut,
        }
    }

    /// Optimistic resolution when the render client is gone
    pub fn unreachable(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            success: true,
            error: None,
            origin: VerdictOrigin::Unreachable,
        }
    }

    /// True when nobody actually rendered the diagram
    pub fn is_inconclusive(&self) -> bool {
        self.origin != VerdictOrigin::Client
    }
}

/// How far validation got for a finished request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// A render client confirmed the diagram renders
    Verified,
    /// Resolved optimistically (timeout or vanished client)
    Inconclusive,
    /// No render target was available or the caller opted out
    Skipped,
    /// The last candidate still failed to render
    Failed,
    /// The provider failed before anything could be validated
    NotReached,
}

/// Terminal value of one generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub chat_answer: String,
    pub diagram_source: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Repair iterations performed
    #[serde(default)]
    pub attempts: u32,
    pub validation: ValidationStatus,
}

impl GenerationOutcome {
    pub fn succeeded(
        chat_answer: impl Into<String>,
        diagram_source: impl Into<String>,
        attempts: u32,
        validation: ValidationStatus,
    ) -> Self {
        Self {
            chat_answer: chat_answer.into(),
            diagram_source: diagram_source.into(),
            success: true,
            error: None,
            attempts,
            validation,
        }
    }

    pub fn failed(
        chat_answer: impl Into<String>,
        diagram_source: impl Into<String>,
        error: impl Into<String>,
        attempts: u32,
        validation: ValidationStatus,
    ) -> Self {
        Self {
            chat_answer: chat_answer.into(),
            diagram_source: diagram_source.into(),
            success: false,
            error: Some(error.into()),
            attempts,
            validation,
        }
    }
}
