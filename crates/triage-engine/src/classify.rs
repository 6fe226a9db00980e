use crate::context;
use crate::prompts;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use triage_core::{Category, ConversationTurn, MatrixAttribute, Provider};
use triage_llm::{ChatBackend, ChatOutcome, LlmError, Message, ParseOutcome, Usage, parse_json_response};

/// One recorded model round-trip: the exact messages sent and the raw text
/// that came back, preserved for the audit trail.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub messages: Vec<Message>,
    pub raw_response: String,
    pub model: String,
    pub provider: Provider,
    pub usage: Option<Usage>,
    pub latency_ms: u64,
}

impl Exchange {
    pub fn new(messages: Vec<Message>, outcome: &ChatOutcome, provider: Provider) -> Self {
        Self {
            messages,
            raw_response: outcome.content.clone(),
            model: outcome.model.clone(),
            provider,
            usage: outcome.usage,
            latency_ms: outcome.latency_ms,
        }
    }

    /// The serialized prompt, exactly as sent.
    pub fn model_prompt(&self) -> String {
        serde_json::to_string(&self.messages).unwrap_or_default()
    }
}

/// A category proposal from the model.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub category: Category,
    pub confidence: f64,
    pub rationale: String,
    pub category_progression: String,
    pub future_opportunities: String,
    pub should_clarify: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProposal {
    /// String normally; models occasionally emit an array.
    category: Value,
    confidence: f64,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    category_progression: String,
    #[serde(default)]
    future_opportunities: String,
    #[serde(default)]
    should_clarify: Option<bool>,
}

fn convert_proposal(raw: RawProposal) -> Result<Proposal, String> {
    let category_str = match &raw.category {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    };
    let category = category_str
        .and_then(Category::parse_lenient)
        .ok_or_else(|| format!("unknown category {:?}", raw.category))?;

    Ok(Proposal {
        category,
        confidence: raw.confidence.clamp(0.0, 1.0),
        rationale: raw.rationale,
        category_progression: raw.category_progression,
        future_opportunities: raw.future_opportunities,
        should_clarify: raw.should_clarify,
    })
}

/// The exact messages a proposal call sends. Built separately from the call
/// so a failed attempt can still be audited.
pub fn proposal_messages(template: Option<&str>, description: &str, conversation_context: &str) -> Vec<Message> {
    let system = prompts::classification_system_prompt(template);
    let mut user = format!("Process description:\n{description}");
    if !conversation_context.is_empty() {
        user.push_str("\n\n");
        user.push_str(conversation_context);
    }
    vec![Message::system(system), Message::user(user)]
}

/// Ask the model for a category proposal.
pub async fn propose(
    backend: &impl ChatBackend,
    messages: Vec<Message>,
) -> Result<(ParseOutcome<Proposal>, Exchange), LlmError> {
    let outcome = backend.chat(messages.clone()).await?;
    let exchange = Exchange::new(messages, &outcome, backend.provider());

    let parsed = parse_json_response::<RawProposal>(&outcome.content)
        .and_then(&outcome.content, convert_proposal);
    if let ParseOutcome::Parsed(p) = &parsed {
        info!(category = %p.category, confidence = p.confidence, "category proposal");
    }
    Ok((parsed, exchange))
}

/// Like [`propose`], but retries once with error feedback when the first
/// response does not parse. The returned exchange is the last round-trip.
pub async fn propose_with_repair(
    backend: &impl ChatBackend,
    messages: Vec<Message>,
) -> Result<(ParseOutcome<Proposal>, Exchange), LlmError> {
    let (first, exchange) = propose(backend, messages).await?;
    let ParseOutcome::Malformed { reason, .. } = &first else {
        return Ok((first, exchange));
    };

    info!(error = %reason, "repair attempt for classification proposal");
    let mut messages = exchange.messages.clone();
    messages.push(Message::assistant(&exchange.raw_response));
    messages.push(Message::user(format!(
        "Your previous output had an error: {reason}\n\nOutput ONLY the corrected JSON object."
    )));

    let outcome = backend.chat(messages.clone()).await?;
    let exchange = Exchange::new(messages, &outcome, backend.provider());
    let parsed = parse_json_response::<RawProposal>(&outcome.content)
        .and_then(&outcome.content, convert_proposal);
    Ok((parsed, exchange))
}

/// Extract matrix attributes from the conversation. Never fails the
/// pipeline: missing or unusable values become the literal `"unknown"`,
/// and a transport failure yields an all-unknown map.
pub async fn extract_attributes(
    backend: &impl ChatBackend,
    template: Option<&str>,
    attributes: &[MatrixAttribute],
    description: &str,
    turns: &[ConversationTurn],
) -> (BTreeMap<String, Value>, Option<Exchange>) {
    if attributes.is_empty() {
        return (BTreeMap::new(), None);
    }

    let system = prompts::extraction_system_prompt(template, attributes);
    let transcript = context::transcript(turns);
    let mut user = format!("Process description:\n{description}");
    if !transcript.is_empty() {
        user.push_str("\n\nInterview answers:\n");
        user.push_str(&transcript);
    }
    let messages = vec![Message::system(system), Message::user(user)];

    let outcome = match backend.chat(messages.clone()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "attribute extraction failed, filling unknowns");
            return (all_unknown(attributes), None);
        }
    };
    let exchange = Exchange::new(messages, &outcome, backend.provider());

    let extracted = match parse_json_response::<BTreeMap<String, Value>>(&outcome.content) {
        ParseOutcome::Parsed(map) => map,
        ParseOutcome::Malformed { reason, .. } => {
            warn!(error = %reason, "attribute extraction unparsable, filling unknowns");
            BTreeMap::new()
        }
    };

    let mut normalized = BTreeMap::new();
    for attribute in attributes {
        let value = extracted
            .get(&attribute.name)
            .and_then(normalize_value)
            .unwrap_or_else(unknown);
        normalized.insert(attribute.name.clone(), value);
    }
    debug!(
        extracted = normalized.len(),
        unknown = normalized.values().filter(|v| is_unknown(v)).count(),
        "attributes extracted"
    );
    (normalized, Some(exchange))
}

fn all_unknown(attributes: &[MatrixAttribute]) -> BTreeMap<String, Value> {
    attributes
        .iter()
        .map(|a| (a.name.clone(), unknown()))
        .collect()
}

fn unknown() -> Value {
    Value::String("unknown".to_string())
}

fn is_unknown(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s == "unknown")
}

/// Scalars pass through; arrays collapse to their first scalar; anything
/// else is unusable.
fn normalize_value(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(Value::String(s.trim().to_string())),
        Value::Number(_) | Value::Bool(_) => Some(value.clone()),
        Value::Array(items) => items.first().and_then(normalize_value),
        _ => None,
    }
}
