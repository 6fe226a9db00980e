use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six transformation outcomes a process description can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Eliminate,
    Simplify,
    Digitise,
    #[serde(rename = "RPA")]
    Rpa,
    #[serde(rename = "AI Agent")]
    AiAgent,
    #[serde(rename = "Agentic AI")]
    AgenticAi,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Eliminate,
        Category::Simplify,
        Category::Digitise,
        Category::Rpa,
        Category::AiAgent,
        Category::AgenticAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Eliminate => "Eliminate",
            Category::Simplify => "Simplify",
            Category::Digitise => "Digitise",
            Category::Rpa => "RPA",
            Category::AiAgent => "AI Agent",
            Category::AgenticAi => "Agentic AI",
        }
    }

    /// Lenient parse for model output: trims, ignores case, tolerates the
    /// "Digitize" spelling.
    pub fn parse_lenient(text: &str) -> Option<Category> {
        match text.trim().to_ascii_lowercase().as_str() {
            "eliminate" => Some(Category::Eliminate),
            "simplify" => Some(Category::Simplify),
            "digitise" | "digitize" => Some(Category::Digitise),
            "rpa" => Some(Category::Rpa),
            "ai agent" => Some(Category::AiAgent),
            "agentic ai" => Some(Category::AgenticAi),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM provider selector. Always explicit in configuration, never inferred
/// from a model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Bedrock,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => f.write_str("openai"),
            Provider::Bedrock => f.write_str("bedrock"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Clarifying,
    PendingAdminReview,
    ManualReview,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Whether the session can still accept clarification answers.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Clarifying)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Clarifying => "clarifying",
            SessionStatus::PendingAdminReview => "pending_admin_review",
            SessionStatus::ManualReview => "manual_review",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One question-and-answer exchange. Either side may be empty: a round that
/// produced no question, or a question not yet answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationExchange {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    pub asked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub turn_index: u32,
    #[serde(default)]
    pub clarification_qa: Vec<ClarificationExchange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category: Category,
    pub confidence: f64,
    pub rationale: String,
    #[serde(default)]
    pub category_progression: String,
    #[serde(default)]
    pub future_opportunities: String,
    pub timestamp: DateTime<Utc>,
    pub model_used: String,
    pub llm_provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_matrix_evaluation: Option<MatrixEvaluation>,
}

/// Record of which matrix rules fired on a particular set of attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixEvaluation {
    pub matrix_version: String,
    pub triggered_rules: Vec<TriggeredRule>,
    pub overridden: bool,
    pub confidence_adjustment_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredRule {
    pub rule_id: String,
    pub rule_name: String,
    pub priority: u8,
    pub action: crate::RuleAction,
}

/// Review verdict recorded by an external admin workflow. Stored verbatim;
/// the core never interprets the notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReview {
    pub reviewed: bool,
    pub reviewer_id: String,
    #[serde(default)]
    pub notes: String,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub description: String,
    #[serde(default)]
    pub conversations: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Freshest category proposal seen during the interview, so terminal
    /// paths that cannot reach the model still have something to commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_proposal: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_review: Option<AdminReview>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            status: SessionStatus::Pending,
            subject: None,
            description: description.into(),
            conversations: Vec::new(),
            classification: None,
            last_proposal: None,
            admin_review: None,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        }
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.last_activity_at = now;
    }

    /// Count of questions asked across all turns. Bounded by the interview
    /// hard limit.
    pub fn questions_asked(&self) -> usize {
        self.conversations
            .iter()
            .flat_map(|t| &t.clarification_qa)
            .filter(|qa| !qa.question.is_empty())
            .count()
    }

    /// Q&A pairs where both sides are present.
    pub fn answered_pairs(&self) -> Vec<(&str, &str)> {
        self.conversations
            .iter()
            .flat_map(|t| &t.clarification_qa)
            .filter(|qa| !qa.question.is_empty() && !qa.answer.is_empty())
            .map(|qa| (qa.question.as_str(), qa.answer.as_str()))
            .collect()
    }

    /// Append a turn holding a new batch of questions. An empty batch is
    /// recorded too: an empty round is part of the interview history.
    pub fn push_turn(&mut self, questions: &[String]) -> &ConversationTurn {
        let now = Utc::now();
        let turn = ConversationTurn {
            turn_index: self.conversations.len() as u32,
            clarification_qa: questions
                .iter()
                .map(|q| ClarificationExchange {
                    question: q.clone(),
                    answer: String::new(),
                    asked_at: now,
                    answered_at: None,
                })
                .collect(),
        };
        self.conversations.push(turn);
        self.touch();
        self.conversations.last().expect("just pushed")
    }

    /// Fill answers into unanswered questions, oldest first. When the caller
    /// echoes back the questions it is answering, pairing is by exact
    /// question text; otherwise answers map positionally onto the open
    /// questions. Returns how many answers were recorded.
    pub fn record_answers(&mut self, answers: &[String], submitted_questions: Option<&[String]>) -> usize {
        let now = Utc::now();
        let mut recorded = 0;

        if let Some(questions) = submitted_questions
            && questions.len() == answers.len()
        {
            for (question, answer) in questions.iter().zip(answers) {
                if answer.trim().is_empty() {
                    continue;
                }
                let slot = self
                    .conversations
                    .iter_mut()
                    .flat_map(|t| &mut t.clarification_qa)
                    .find(|qa| qa.answer.is_empty() && qa.question == *question);
                match slot {
                    Some(qa) => {
                        qa.answer = answer.clone();
                        qa.answered_at = Some(now);
                        recorded += 1;
                    }
                    None => {
                        // Question the system never asked; keep the pair so
                        // the audit trail matches what the caller saw.
                        if let Some(turn) = self.conversations.last_mut() {
                            turn.clarification_qa.push(ClarificationExchange {
                                question: question.clone(),
                                answer: answer.clone(),
                                asked_at: now,
                                answered_at: Some(now),
                            });
                            recorded += 1;
                        }
                    }
                }
            }
        } else {
            let mut remaining = answers.iter().filter(|a| !a.trim().is_empty());
            for turn in &mut self.conversations {
                for qa in &mut turn.clarification_qa {
                    if !qa.question.is_empty() && qa.answer.is_empty() {
                        match remaining.next() {
                            Some(answer) => {
                                qa.answer = answer.clone();
                                qa.answered_at = Some(now);
                                recorded += 1;
                            }
                            None => break,
                        }
                    }
                }
            }
        }

        if recorded > 0 {
            self.touch();
        }
        recorded
    }
}
