use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the classification pipeline. Defaults match the documented
/// interview limits; everything here can be overridden by the embedding
/// application.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Root of the on-disk layout: `sessions/`, `prompts/`,
    /// `decision-matrix/`, `audit-logs/`.
    pub data_dir: PathBuf,

    /// Question count at which the interview starts asking for a single
    /// final question per round.
    pub soft_limit_questions: usize,
    /// Question count at which the interview is forcibly terminated.
    pub hard_limit_questions: usize,
    /// Answered Q&A pairs at which conversation context switches from the
    /// raw transcript to the compressed digest.
    pub summarization_threshold: usize,
    /// Consecutive question-empty rounds that mean the model has given up.
    pub empty_round_threshold: usize,
    /// How many recent clarification events loop detection inspects.
    pub silent_detection_window: usize,

    /// Confidence at or above which a proposal can complete without an
    /// interview, provided the description is long and complete enough.
    pub auto_classify_confidence: f64,
    /// Confidence below which the session is routed to manual review.
    pub manual_review_confidence: f64,
    /// Minimum description length (words) for the no-interview fast path.
    pub min_description_words: usize,
    /// How many of the six information indicators must be present for the
    /// no-interview fast path.
    pub completeness_indicators_required: usize,

    /// Idle time after which the hygiene sweep closes a session.
    pub session_timeout: Duration,
    /// Route successful classifications to `pending_admin_review` instead
    /// of `completed`.
    pub require_admin_review: bool,
}

impl TriageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            soft_limit_questions: 8,
            hard_limit_questions: 15,
            summarization_threshold: 5,
            empty_round_threshold: 2,
            silent_detection_window: 3,
            auto_classify_confidence: 0.95,
            manual_review_confidence: 0.60,
            min_description_words: 50,
            completeness_indicators_required: 4,
            session_timeout: Duration::from_secs(2 * 60 * 60),
            require_admin_review: false,
        }
    }
}
