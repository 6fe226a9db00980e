use crate::{BedrockClient, ChatOutcome, LlmError, Message, ModelInfo, OpenAiClient};
use std::future::Future;
use tracing::debug;
use triage_core::Provider;

/// Seam for LLM interaction, allowing scripted backends in tests.
///
/// Implementations are not idempotent: the model is non-deterministic, so
/// every call produces a fresh result and callers record both the prompt
/// and the raw response.
pub trait ChatBackend: Send + Sync {
    fn chat(&self, messages: Vec<Message>) -> impl Future<Output = Result<ChatOutcome, LlmError>> + Send;

    fn list_models(&self) -> impl Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send;

    fn model_name(&self) -> &str;

    fn provider(&self) -> Provider;
}

/// Per-request provider configuration. The provider is always explicit;
/// it is never inferred from the model id. Credentials are request-scoped:
/// they live exactly as long as the client built from them and are redacted
/// from debug output.
#[derive(Clone)]
pub struct RequestConfig {
    pub provider: Provider,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// OpenAI bearer token.
    pub api_key: Option<String>,
    /// Override for OpenAI-compatible endpoints; defaults to api.openai.com.
    pub base_url: Option<String>,

    /// AWS region, required for Bedrock.
    pub region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    /// Optional regional inference endpoint override for Bedrock.
    pub endpoint_url: Option<String>,
}

impl RequestConfig {
    pub fn openai(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenAi,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            api_key: Some(api_key.into()),
            base_url: None,
            region: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            endpoint_url: None,
        }
    }

    pub fn bedrock(
        model: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            provider: Provider::Bedrock,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            api_key: None,
            base_url: None,
            region: Some(region.into()),
            aws_access_key_id: Some(access_key_id.into()),
            aws_secret_access_key: Some(secret_access_key.into()),
            aws_session_token: None,
            endpoint_url: None,
        }
    }
}

impl std::fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("aws_access_key_id", &self.aws_access_key_id.as_deref().map(|_| "<redacted>"))
            .field("aws_secret_access_key", &self.aws_secret_access_key.as_deref().map(|_| "<redacted>"))
            .field("aws_session_token", &self.aws_session_token.as_deref().map(|_| "<redacted>"))
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

const OPENAI_MODEL_PREFIXES: &[&str] = &["gpt-", "chatgpt-", "o1", "o3", "o4"];
const BEDROCK_MODEL_PREFIXES: &[&str] = &[
    "anthropic.",
    "amazon.",
    "meta.",
    "mistral.",
    "cohere.",
    "ai21.",
    "us.",
    "eu.",
    "apac.",
];

/// Model support is permissive: unfamiliar ids get a log line, not a
/// rejection. The provider is the authority on what it can serve.
pub(crate) fn note_unfamiliar_model(provider: Provider, model: &str) {
    let prefixes = match provider {
        Provider::OpenAi => OPENAI_MODEL_PREFIXES,
        Provider::Bedrock => BEDROCK_MODEL_PREFIXES,
    };
    if !prefixes.iter().any(|p| model.starts_with(p)) {
        debug!(%provider, model, "model id does not match any known prefix, passing through");
    }
}

/// Runtime-dispatched provider client, constructed fresh from each
/// request's configuration.
pub enum ProviderClient {
    OpenAi(OpenAiClient),
    Bedrock(BedrockClient),
}

impl ProviderClient {
    pub async fn connect(config: &RequestConfig) -> Result<Self, LlmError> {
        match config.provider {
            Provider::OpenAi => Ok(ProviderClient::OpenAi(OpenAiClient::new(config))),
            Provider::Bedrock => Ok(ProviderClient::Bedrock(BedrockClient::connect(config).await?)),
        }
    }
}

impl ChatBackend for ProviderClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatOutcome, LlmError> {
        match self {
            ProviderClient::OpenAi(client) => client.chat(messages).await,
            ProviderClient::Bedrock(client) => client.chat(messages).await,
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        match self {
            ProviderClient::OpenAi(client) => client.list_models().await,
            ProviderClient::Bedrock(client) => client.list_models().await,
        }
    }

    fn model_name(&self) -> &str {
        match self {
            ProviderClient::OpenAi(client) => client.model_name(),
            ProviderClient::Bedrock(client) => client.model_name(),
        }
    }

    fn provider(&self) -> Provider {
        match self {
            ProviderClient::OpenAi(client) => client.provider(),
            ProviderClient::Bedrock(client) => client.provider(),
        }
    }
}
