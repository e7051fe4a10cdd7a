use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use diagram_common::{DraftResult, GenerationContext, LlmConfig};
use tracing::{debug, info, Instrument};

use super::{parse::parse_draft, prompt, GenerationClient, RepairRequest};
use crate::error::GenerationResult;

/// Chat-completions client for any OpenAI-compatible endpoint
#[derive(Clone)]
pub struct OpenAiGenerationClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiGenerationClient {
    pub fn new(config: &LlmConfig) -> Self {
        // Ollama ignores the key but the client always sends one
        let openai_config = OpenAIConfig::new()
            .with_api_base(config.api_base.trim_end_matches('/'))
            .with_api_key(config.resolved_api_key().unwrap_or_else(|| "ollama".to_string()));

        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, operation: &'static str, messages: Vec<ChatCompletionRequestMessage>) -> GenerationResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(messages)
            .build()?;

        let span = tracing::info_span!(
            "llm_inference",
            operation,
            "llm.model" = %self.model,
            message_count = request.messages.len(),
            "llm.response_chars" = tracing::field::Empty,
        );

        async {
            let started = Instant::now();
            let response = self.client.chat().create(request).await?;
            let content = response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();

            tracing::Span::current().record("llm.response_chars", content.len());
            info!(
                latency_ms = started.elapsed().as_millis() as u64,
                response_chars = content.len(),
                "LLM inference completed"
            );
            Ok(content)
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn draft(&self, context: &GenerationContext) -> GenerationResult<DraftResult> {
        let messages = prompt::draft_messages(context)?;
        let raw = self.complete("draft", messages).await?;
        debug!(raw_chars = raw.len(), "Draft response received");
        Ok(parse_draft(&raw))
    }

    async fn repair(&self, request: RepairRequest<'_>) -> GenerationResult<DraftResult> {
        let messages = prompt::repair_messages(&request)?;
        let raw = self.complete("repair", messages).await?;
        debug!(raw_chars = raw.len(), "Repair response received");
        Ok(parse_draft(&raw))
    }
}
