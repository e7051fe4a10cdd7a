use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagramError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration validation failed: {details}")]
    ConfigValidation { details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DiagramError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(details: impl Into<String>) -> Self {
        Self::ConfigValidation {
            details: details.into(),
        }
    }
}

pub type DiagramResult<T> = std::result::Result<T, DiagramError>;
