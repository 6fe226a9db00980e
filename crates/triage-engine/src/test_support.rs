//! Scripted LLM double for engine and downstream tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use triage_core::Provider;
use triage_llm::{ChatBackend, ChatOutcome, LlmError, Message, ModelInfo, Usage};

enum ScriptedReply {
    Text(String),
    HttpError(u16),
}

/// Backend that replays queued responses and records every call. Unlike the
/// real clients it applies no retry policy, so error replies surface
/// immediately.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<Vec<Message>>>,
    model: String,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| ScriptedReply::Text(r.to_string()))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
            model: "scripted-model".to_string(),
        }
    }

    pub fn push(&self, response: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Text(response.to_string()));
    }

    pub fn push_error(&self, status: u16) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::HttpError(status));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl ChatBackend for ScriptedLlm {
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatOutcome, LlmError> {
        self.calls.lock().unwrap().push(messages);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedLlm ran out of scripted responses");
        match reply {
            ScriptedReply::Text(content) => Ok(ChatOutcome {
                content,
                model: self.model.clone(),
                usage: Some(Usage {
                    prompt_tokens: 42,
                    completion_tokens: 17,
                    total_tokens: 59,
                }),
                latency_ms: 12,
            }),
            ScriptedReply::HttpError(status) => Err(LlmError::Http {
                status,
                body: "scripted failure".to_string(),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(vec![ModelInfo {
            id: self.model.clone(),
            name: None,
            provider: Provider::OpenAi,
        }])
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }
}
