use crate::classify::Exchange;
use crate::prompts;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use triage_llm::{ChatBackend, LlmError, Message, ParseOutcome, parse_json_response};

/// Why the interview stopped asking questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The hard question limit was reached.
    HardLimit,
    /// The last rounds all came back question-empty.
    LlmExhausted,
    /// The model signalled `shouldClarify = false`.
    LlmConfident,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::HardLimit => "hard_limit",
            StopReason::LlmExhausted => "llm_exhausted",
            StopReason::LlmConfident => "llm_confident",
        }
    }
}

/// One generated question batch, empty rounds included.
#[derive(Debug)]
pub struct QuestionRound {
    pub questions: Vec<String>,
    pub should_clarify: bool,
    /// The response matched the known `Clarification N` meta-commentary
    /// failure mode instead of JSON.
    pub meta_commentary: bool,
    pub exchange: Exchange,
}

impl QuestionRound {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestions {
    #[serde(default)]
    questions: Vec<Value>,
    #[serde(default = "default_true")]
    should_clarify: bool,
}

fn default_true() -> bool {
    true
}

/// The `Clarification <N>` failure mode: the model narrates which round it
/// is on instead of producing JSON.
pub fn is_meta_commentary(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    let Some(rest) = lower.strip_prefix("clarification") else {
        return false;
    };
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return false;
    }
    let digits = rest.trim_start();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Build the messages and batch cap for the next round. Past the soft
/// limit the round is a "final round": one question at most.
pub fn round_request(
    template: Option<&str>,
    description: &str,
    conversation_context: &str,
    questions_asked: usize,
    soft_limit: usize,
) -> (Vec<Message>, usize) {
    let final_round = questions_asked >= soft_limit;
    if final_round {
        warn!(questions_asked, soft_limit, "soft question limit crossed, asking for one final question");
    }

    let system = prompts::clarification_system_prompt(template, final_round);
    let mut user = format!("Process description:\n{description}");
    if !conversation_context.is_empty() {
        user.push_str("\n\n");
        user.push_str(conversation_context);
    }
    user.push_str(&format!("\n\nQuestions asked so far: {questions_asked}"));

    let cap = if final_round { 1 } else { 3 };
    (vec![Message::system(system), Message::user(user)], cap)
}

/// Ask the model for the next question batch. The raw response is inspected
/// before it is trusted: meta-commentary and unparsable output both become
/// an empty round, which the caller records and which loop detection feeds
/// on. This function only fails on transport errors.
pub async fn next_questions(
    backend: &impl ChatBackend,
    messages: Vec<Message>,
    cap: usize,
) -> Result<QuestionRound, LlmError> {
    let outcome = backend.chat(messages.clone()).await?;
    let exchange = Exchange::new(messages, &outcome, backend.provider());

    if is_meta_commentary(&outcome.content) {
        info!(response = %outcome.content, "model emitted round meta-commentary, recording empty round");
        return Ok(QuestionRound {
            questions: Vec::new(),
            should_clarify: true,
            meta_commentary: true,
            exchange,
        });
    }

    let round = match parse_json_response::<RawQuestions>(&outcome.content) {
        ParseOutcome::Parsed(raw) => {
            let questions: Vec<String> = raw
                .questions
                .iter()
                .filter_map(question_text)
                .take(cap)
                .collect();
            QuestionRound {
                questions,
                should_clarify: raw.should_clarify,
                meta_commentary: false,
                exchange,
            }
        }
        ParseOutcome::Malformed { reason, .. } => {
            debug!(error = %reason, "clarification output unparsable, recording empty round");
            QuestionRound {
                questions: Vec::new(),
                should_clarify: true,
                meta_commentary: false,
                exchange,
            }
        }
    };

    Ok(round)
}

/// Accept both `"..."` and `{"question": "..."}` items.
fn question_text(item: &Value) -> Option<String> {
    let text = match item {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("question").and_then(Value::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

/// Stop condition: the most recent `threshold` clarification events all
/// produced zero questions.
pub fn interview_exhausted(recent: &[triage_core::audit::AuditEntry], threshold: usize) -> bool {
    recent.len() >= threshold
        && recent[recent.len() - threshold..]
            .iter()
            .all(|e| e.question_count() == 0)
}

/// Loop detection over the silent window: how many of the given events were
/// question-empty, and whether that crosses the threshold.
pub fn loop_detected(recent: &[triage_core::audit::AuditEntry], threshold: usize) -> (bool, usize) {
    let empties = recent.iter().filter(|e| e.question_count() == 0).count();
    (empties >= threshold, empties)
}
