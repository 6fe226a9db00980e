use crate::client::{ChatBackend, RequestConfig, note_unfamiliar_model};
use crate::retry::{RetryPolicy, with_retry};
use crate::types::{ChatCompletionResponse, ChatRequest, ModelsResponse};
use crate::{ChatOutcome, LlmError, Message, ModelInfo};
use std::time::Instant;
use tracing::{debug, info, trace};
use triage_core::Provider;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI (and OpenAI-compatible) chat client.
pub struct OpenAiClient {
    model: String,
    base_url: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(config: &RequestConfig) -> Self {
        note_unfamiliar_model(Provider::OpenAi, &config.model);
        Self {
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn chat_once(&self, messages: &[Message]) -> Result<ChatOutcome, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(url = %url, message_count = messages.len(), model = %self.model, "chat request");

        let started = Instant::now();
        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;
        let latency_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            return Err(LlmError::Http { status: status.as_u16(), body });
        }

        trace!(response_body = %body, "chat response body");

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| LlmError::Provider {
            code: "invalid_response_body".to_string(),
            message: format!("could not parse completion response: {e}"),
            retryable: false,
        })?;

        if let Some(usage) = &parsed.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                latency_ms,
                "chat usage"
            );
        }

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(ChatOutcome {
            content,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage: parsed.usage,
            latency_ms,
        })
    }

    async fn list_once(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let mut builder = self.http.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;
        if !status.is_success() {
            return Err(LlmError::Http { status: status.as_u16(), body });
        }

        let parsed: ModelsResponse = serde_json::from_str(&body).map_err(|e| LlmError::Provider {
            code: "invalid_response_body".to_string(),
            message: format!("could not parse models response: {e}"),
            retryable: false,
        })?;

        Ok(parsed
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                name: None,
                provider: Provider::OpenAi,
            })
            .collect())
    }
}

fn map_transport(e: reqwest::Error) -> LlmError {
    LlmError::Transport(e.to_string())
}

impl ChatBackend for OpenAiClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatOutcome, LlmError> {
        with_retry(&self.retry, "openai chat", || self.chat_once(&messages)).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        with_retry(&self.retry, "openai models", || self.list_once()).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }
}
