use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{DiagramError, DiagramResult};

/// Environment variable consulted when `llm.api_key` is not set in the file
pub const API_KEY_ENV: &str = "DIAGRAM_LLM_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub repair: RepairConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow cross-origin requests from any browser origin
    #[serde(default = "default_cors_permissive")]
    pub cors_permissive: bool,
}

/// OpenAI-compatible completion endpoint (OpenAI, Ollama, vLLM, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Caller-side bound on a single provider call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Upper bound on repair iterations per request
    #[serde(default = "default_max_fix_attempts")]
    pub max_fix_attempts: u32,
    /// How long to wait for a render verdict before resolving optimistically
    #[serde(default = "default_validation_timeout_ms")]
    pub validation_timeout_ms: u64,
    /// Report timed-out or unreachable validations as failures instead of successes
    #[serde(default)]
    pub inconclusive_is_failure: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_permissive() -> bool {
    true
}

fn default_api_base() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:14b".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_fix_attempts() -> u32 {
    20
}

fn default_validation_timeout_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: default_cors_permissive(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_fix_attempts: default_max_fix_attempts(),
            validation_timeout_ms: default_validation_timeout_ms(),
            inconclusive_is_failure: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl LlmConfig {
    /// API key from the file, falling back to the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RepairConfig {
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }
}

impl SystemConfig {
    /// Parse a TOML file without validating it
    pub fn from_file(path: impl AsRef<Path>) -> DiagramResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> DiagramResult<Self> {
        let config: SystemConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Parse and validate; a missing file yields the defaults
    pub fn load_config(path: impl AsRef<Path>) -> DiagramResult<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DiagramResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(DiagramError::validation("server.host must not be empty"));
        }
        if self.llm.api_base.trim().is_empty() {
            return Err(DiagramError::validation("llm.api_base must not be empty"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(DiagramError::validation("llm.model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DiagramError::validation(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(DiagramError::validation("llm.request_timeout_secs must be greater than 0"));
        }
        if self.repair.validation_timeout_ms == 0 {
            return Err(DiagramError::validation("repair.validation_timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}
