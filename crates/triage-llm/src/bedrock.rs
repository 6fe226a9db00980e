use crate::client::{ChatBackend, RequestConfig, note_unfamiliar_model};
use crate::retry::{RetryPolicy, with_retry};
use crate::{ChatOutcome, LlmError, Message, ModelInfo, Usage};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::config::Credentials;
use aws_sdk_bedrockruntime::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, InferenceConfiguration, Message as ConverseMessage,
    SystemContentBlock,
};
use std::time::Instant;
use tracing::{debug, info};
use triage_core::Provider;

/// AWS Bedrock chat client over the Converse API. Credentials, region and
/// the optional regional inference endpoint come from the per-request
/// configuration; nothing is read from the process environment.
#[derive(Debug)]
pub struct BedrockClient {
    model: String,
    runtime: aws_sdk_bedrockruntime::Client,
    control: aws_sdk_bedrock::Client,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
}

impl BedrockClient {
    pub async fn connect(config: &RequestConfig) -> Result<Self, LlmError> {
        let region = config
            .region
            .clone()
            .ok_or_else(|| LlmError::Config("bedrock requires a region".into()))?;
        let (Some(access_key), Some(secret_key)) =
            (&config.aws_access_key_id, &config.aws_secret_access_key)
        else {
            return Err(LlmError::Config("bedrock requires an access key pair".into()));
        };

        note_unfamiliar_model(Provider::Bedrock, &config.model);

        let credentials = Credentials::new(
            access_key,
            secret_key,
            config.aws_session_token.clone(),
            None,
            "triage-request",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut runtime_config = aws_sdk_bedrockruntime::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            debug!(endpoint = %endpoint, "using regional inference endpoint");
            runtime_config = runtime_config.endpoint_url(endpoint);
        }

        Ok(Self {
            model: config.model.clone(),
            runtime: aws_sdk_bedrockruntime::Client::from_conf(runtime_config.build()),
            control: aws_sdk_bedrock::Client::new(&shared),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn converse_once(&self, messages: &[Message]) -> Result<ChatOutcome, LlmError> {
        let (system, turns) = split_messages(messages)?;

        let mut inference = InferenceConfiguration::builder();
        if let Some(temperature) = self.temperature {
            inference = inference.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            inference = inference.max_tokens(max_tokens as i32);
        }

        debug!(model = %self.model, message_count = turns.len(), "converse request");

        let started = Instant::now();
        let response = self
            .runtime
            .converse()
            .model_id(&self.model)
            .set_messages(Some(turns))
            .set_system(if system.is_empty() { None } else { Some(system) })
            .inference_config(inference.build())
            .send()
            .await
            .map_err(classify_sdk_error)?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let usage = response.usage().map(|u| Usage {
            prompt_tokens: u.input_tokens().max(0) as u32,
            completion_tokens: u.output_tokens().max(0) as u32,
            total_tokens: u.total_tokens().max(0) as u32,
        });
        if let Some(usage) = &usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                latency_ms,
                "converse usage"
            );
        }

        let content = response
            .output()
            .and_then(|output| output.as_message().ok())
            .map(|message| {
                message
                    .content()
                    .iter()
                    .filter_map(|block| block.as_text().ok().cloned())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(ChatOutcome {
            content,
            model: self.model.clone(),
            usage,
            latency_ms,
        })
    }

    async fn list_once(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let response = self
            .control
            .list_foundation_models()
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(response
            .model_summaries()
            .iter()
            .map(|summary| ModelInfo {
                id: summary.model_id().to_string(),
                name: summary.model_name().map(str::to_string),
                provider: Provider::Bedrock,
            })
            .collect())
    }
}

impl ChatBackend for BedrockClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatOutcome, LlmError> {
        with_retry(&self.retry, "bedrock converse", || self.converse_once(&messages)).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        with_retry(&self.retry, "bedrock models", || self.list_once()).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::Bedrock
    }
}

/// Partition the uniform message list into Converse's shape: system blocks
/// ride a dedicated field, everything else becomes user/assistant turns.
fn split_messages(messages: &[Message]) -> Result<(Vec<SystemContentBlock>, Vec<ConverseMessage>), LlmError> {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for message in messages {
        match message.role.as_str() {
            "system" => system.push(SystemContentBlock::Text(message.content.clone())),
            role => {
                let role = if role == "assistant" {
                    ConversationRole::Assistant
                } else {
                    ConversationRole::User
                };
                let turn = ConverseMessage::builder()
                    .role(role)
                    .content(ContentBlock::Text(message.content.clone()))
                    .build()
                    .map_err(|e| LlmError::Config(format!("could not build converse message: {e}")))?;
                turns.push(turn);
            }
        }
    }
    Ok((system, turns))
}

/// Exception codes Bedrock documents as transient. Everything else (access
/// denied, validation, model not granted, provisioned-throughput required)
/// fails the call outright.
fn is_retryable_code(code: &str) -> bool {
    matches!(
        code,
        "ThrottlingException"
            | "InternalServerException"
            | "ServiceUnavailableException"
            | "ModelTimeoutException"
            | "ModelNotReadyException"
    )
}

fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> LlmError
where
    E: ProvideErrorMetadata,
{
    match &err {
        SdkError::TimeoutError(_) => LlmError::Transport("bedrock request timed out".into()),
        SdkError::DispatchFailure(_) => LlmError::Transport("failed to dispatch request to bedrock".into()),
        SdkError::ResponseError(_) => LlmError::Transport("malformed bedrock transport response".into()),
        SdkError::ServiceError(_) => {
            let code = err.code().unwrap_or("Unknown").to_string();
            let message = err.message().unwrap_or("no detail").to_string();
            let retryable = is_retryable_code(&code);
            LlmError::Provider { code, message, retryable }
        }
        _ => LlmError::Transport("unclassified bedrock failure".into()),
    }
}
