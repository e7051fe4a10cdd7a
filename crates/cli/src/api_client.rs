use anyhow::{Context, Result};
use diagram_common::{ChatTurn, ConnectionId, GenerationOutcome};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client for the diagram server's HTTP API
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

/// Body of `POST /generate`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody<'a> {
    pub prompt: &'a str,
    pub chat_history: &'a [ChatTurn],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_diagram: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<&'a ConnectionId>,
    pub validate: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: Option<String>,
}

impl ApiClient {
    /// `timeout` bounds a whole request, repair loop included
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn generate(&self, body: &GenerateBody<'_>) -> Result<GenerationOutcome> {
        let url = format!("{}/generate", self.base_url);
        debug!(url = %url, prompt_len = body.prompt.len(), "Sending generate request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Could not reach diagram server at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ErrorBody>(&text) {
                Ok(ErrorBody { error, code: Some(code) }) => anyhow::bail!("{error} ({code}, HTTP {status})"),
                Ok(ErrorBody { error, code: None }) => anyhow::bail!("{error} (HTTP {status})"),
                Err(_) => anyhow::bail!("API request failed: {status}"),
            }
        }

        response
            .json::<GenerationOutcome>()
            .await
            .context("Server returned an unexpected response body")
    }

    /// Raw `/health` document
    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("Could not reach diagram server at {}", self.base_url))?;

        if !response.status().is_success() {
            anyhow::bail!("Health check failed: {}", response.status());
        }
        Ok(response.json().await?)
    }
}
