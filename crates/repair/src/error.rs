use diagram_common::ConnectionId;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the generation provider.
///
/// Unparseable provider output is not an error; it degrades to an empty draft.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("LLM request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to build LLM request: {0}")]
    Build(String),
}

impl GenerationError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

impl From<async_openai::error::OpenAIError> for GenerationError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        match err {
            async_openai::error::OpenAIError::InvalidArgument(msg) => Self::Build(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Render connection not found: {0}")]
    NotConnected(ConnectionId),

    #[error("Render connection closed: {0}")]
    Closed(ConnectionId),
}

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;
