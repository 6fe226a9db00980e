use crate::clarify::{self, StopReason};
use crate::classify::{self, Exchange, Proposal};
use crate::context;
use crate::error::PipelineError;
use crate::matrix_eval::{self, EvaluationOutcome};
use crate::prompts;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use triage_core::audit::{AuditEntry, AuditEventType, AuditLog, AuditMetadata, PUBLIC_SESSION};
use triage_core::config::TriageConfig;
use triage_core::content_store::ContentStore;
use triage_core::session_store::SessionStore;
use triage_core::{
    AdminReview, Category, Classification, Session, SessionStatus, StoreError,
};
use triage_llm::{ChatBackend, LlmError, ModelInfo, ParseOutcome, ProviderClient, RequestConfig};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Classified,
    Clarifying,
    ManualReview,
    PendingAdminReview,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub description: String,
    pub subject: Option<String>,
    pub user_id: String,
}

#[derive(Debug)]
pub struct SubmitOutcome {
    pub session_id: Uuid,
    pub phase: Phase,
    pub classification: Option<Classification>,
    pub questions: Vec<String>,
}

#[derive(Debug)]
pub struct ReclassifyOutcome {
    pub original: Classification,
    pub new: Classification,
    pub changed: bool,
    pub confidence_delta: f64,
    pub matrix_evaluation: Option<triage_core::MatrixEvaluation>,
}

/// How a session reached its terminal classification.
#[derive(Debug)]
enum Terminal {
    /// The confidence/length/completeness gate passed with no interview.
    Auto,
    /// Confidence too low to trust; classified but routed to a human.
    Manual,
    /// The caller bypassed the rest of the interview.
    Forced { questions_asked: usize },
    /// Loop detection fired on repeated empty rounds.
    Loop { empty_rounds: usize },
    /// An interview stop condition ended the clarification.
    Stopped(StopReason),
}

impl Terminal {
    fn action(&self) -> &'static str {
        match self {
            Terminal::Auto | Terminal::Loop { .. } | Terminal::Stopped(_) => "auto_classify",
            Terminal::Manual => "manual_review",
            Terminal::Forced { .. } => "force_classify",
        }
    }

    fn reason(&self) -> Option<&'static str> {
        match self {
            Terminal::Loop { .. } => Some("empty_question_rounds"),
            Terminal::Stopped(reason) => Some(reason.as_str()),
            Terminal::Manual => Some("low_confidence"),
            Terminal::Auto | Terminal::Forced { .. } => None,
        }
    }
}

/// Top-level state machine binding the LLM services, the decision matrix,
/// the session store and the audit log.
///
/// Within a session everything is serialized: submit, clarify and
/// reclassify hold the session mutex for the whole call, LLM round-trips
/// included. The audit entry for a decision is always written before the
/// session document.
pub struct Pipeline {
    config: TriageConfig,
    sessions: SessionStore,
    content: ContentStore,
    audit: Arc<AuditLog>,
}

impl Pipeline {
    pub fn new(config: TriageConfig) -> Result<Self, PipelineError> {
        let audit = Arc::new(AuditLog::new(config.data_dir.join("audit-logs"))?);
        let sessions = SessionStore::new(config.data_dir.join("sessions"))?;
        let content = ContentStore::new(&config.data_dir, Arc::clone(&audit))?;
        Ok(Self { config, sessions, content, audit })
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    // ── Public operations ───────────────────────────────────────

    pub async fn submit(&self, request: SubmitRequest, llm: &RequestConfig) -> Result<SubmitOutcome, PipelineError> {
        let backend = ProviderClient::connect(llm).await?;
        self.submit_with_backend(&backend, request).await
    }

    pub async fn submit_with_backend(
        &self,
        backend: &impl ChatBackend,
        request: SubmitRequest,
    ) -> Result<SubmitOutcome, PipelineError> {
        let description = request.description.trim().to_string();
        if description.is_empty() {
            return Err(PipelineError::InvalidInput("description must not be empty".into()));
        }

        // Lazy hygiene: close idle sessions on the way in. Never blocks the
        // submit itself.
        if let Err(e) = self.sessions.sweep_idle(self.config.session_timeout, &self.audit) {
            warn!(error = %e, "idle-session sweep failed");
        }

        let mut session = Session::new(request.user_id, description);
        session.subject = request.subject.filter(|s| !s.trim().is_empty());
        info!(session = %session.session_id, "submission received");

        let handle = self.sessions.lock_handle(session.session_id);
        let _guard = handle.lock().await;
        self.evaluate(backend, &mut session, false).await
    }

    pub async fn clarify(
        &self,
        session_id: Uuid,
        answers: Vec<String>,
        submitted_questions: Option<Vec<String>>,
        force_classify: bool,
        llm: &RequestConfig,
    ) -> Result<SubmitOutcome, PipelineError> {
        let backend = ProviderClient::connect(llm).await?;
        self.clarify_with_backend(&backend, session_id, answers, submitted_questions, force_classify)
            .await
    }

    pub async fn clarify_with_backend(
        &self,
        backend: &impl ChatBackend,
        session_id: Uuid,
        answers: Vec<String>,
        submitted_questions: Option<Vec<String>>,
        force_classify: bool,
    ) -> Result<SubmitOutcome, PipelineError> {
        let handle = self.sessions.lock_handle(session_id);
        let _guard = handle.lock().await;

        let mut session = self.load_session(session_id)?;
        if !session.status.is_active() {
            return Err(PipelineError::InvalidState { session: session_id, status: session.status });
        }

        let recorded = session.record_answers(&answers, submitted_questions.as_deref());
        info!(session = %session_id, recorded, force_classify, "clarification answers received");

        self.evaluate(backend, &mut session, force_classify).await
    }

    pub async fn reclassify(
        &self,
        session_id: Uuid,
        llm: &RequestConfig,
        reason: &str,
    ) -> Result<ReclassifyOutcome, PipelineError> {
        let backend = ProviderClient::connect(llm).await?;
        self.reclassify_with_backend(&backend, session_id, reason).await
    }

    /// Re-run classification and matrix evaluation with the current prompts
    /// and matrix, keeping the description and conversation frozen. The
    /// audit entry carrying both classifications is written before the
    /// session's classification is overwritten.
    pub async fn reclassify_with_backend(
        &self,
        backend: &impl ChatBackend,
        session_id: Uuid,
        reason: &str,
    ) -> Result<ReclassifyOutcome, PipelineError> {
        let handle = self.sessions.lock_handle(session_id);
        let _guard = handle.lock().await;

        let mut session = self.load_session(session_id)?;
        if session.description.trim().is_empty() {
            return Err(PipelineError::NoDescription(session_id));
        }
        let Some(original) = session.classification.clone() else {
            return Err(PipelineError::InvalidState { session: session_id, status: session.status });
        };

        let template = self.prompt_template(prompts::CLASSIFICATION_PROMPT_ID)?;
        let conversation_context = context::build_context(
            &session.description,
            &session.conversations,
            self.config.summarization_threshold,
        );
        let messages =
            classify::proposal_messages(template.as_deref(), &session.description, &conversation_context);
        let (parsed, exchange) = classify::propose_with_repair(backend, messages).await?;
        let proposal = match parsed {
            ParseOutcome::Parsed(p) => p,
            ParseOutcome::Malformed { reason, .. } => {
                return Err(PipelineError::UnusableModelOutput(reason));
            }
        };

        let (evaluation, attributes) = self.apply_matrix(backend, &session, &proposal).await?;
        let new = build_classification(backend, &proposal, evaluation.as_ref());

        self.audit.append(
            &AuditEntry::for_session(session_id, AuditEventType::Reclassification, &session.user_id)
                .with_data(json!({
                    "originalClassification": original,
                    "newClassification": new,
                    "reason": reason,
                    "attributes": attributes,
                }))
                .with_exchange(exchange.model_prompt(), exchange.raw_response.clone())
                .with_metadata(AuditMetadata {
                    model_version: Some(exchange.model.clone()),
                    llm_provider: Some(exchange.provider),
                    latency_ms: Some(exchange.latency_ms),
                    action: Some("reclassification".into()),
                    ..AuditMetadata::default()
                }),
        )?;

        session.classification = Some(new.clone());
        if evaluation.as_ref().is_some_and(|e| e.flagged_for_review) {
            session.status = SessionStatus::ManualReview;
        }
        session.touch();
        self.sessions.save(&session)?;

        let changed = original.category != new.category;
        let confidence_delta = new.confidence - original.confidence;
        info!(
            session = %session_id,
            original = %original.category,
            new = %new.category,
            changed,
            confidence_delta,
            "session reclassified"
        );

        Ok(ReclassifyOutcome {
            matrix_evaluation: new.decision_matrix_evaluation.clone(),
            original,
            new,
            changed,
            confidence_delta,
        })
    }

    /// Record an external admin verdict. A confirmed review completes a
    /// session that was waiting on one.
    pub async fn record_admin_review(&self, session_id: Uuid, review: AdminReview) -> Result<(), PipelineError> {
        let handle = self.sessions.lock_handle(session_id);
        let _guard = handle.lock().await;

        let mut session = self.load_session(session_id)?;
        self.audit.append(
            &AuditEntry::for_session(session_id, AuditEventType::AdminReview, &review.reviewer_id)
                .with_data(json!(review))
                .with_metadata(AuditMetadata {
                    action: Some("admin_review".into()),
                    ..AuditMetadata::default()
                }),
        )?;

        if review.reviewed && session.status == SessionStatus::PendingAdminReview {
            session.status = SessionStatus::Completed;
        }
        session.admin_review = Some(review);
        session.touch();
        self.sessions.save(&session)?;
        Ok(())
    }

    /// List the provider's models, recording the result against the
    /// `public` session id.
    pub async fn list_models(&self, llm: &RequestConfig, user_id: &str) -> Result<Vec<ModelInfo>, PipelineError> {
        let backend = match ProviderClient::connect(llm).await {
            Ok(backend) => backend,
            Err(e) => {
                self.audit_model_listing(user_id, Err(&e))?;
                return Err(e.into());
            }
        };
        self.list_models_with_backend(&backend, user_id).await
    }

    pub async fn list_models_with_backend(
        &self,
        backend: &impl ChatBackend,
        user_id: &str,
    ) -> Result<Vec<ModelInfo>, PipelineError> {
        match backend.list_models().await {
            Ok(models) => {
                self.audit_model_listing(user_id, Ok(models.len()))?;
                Ok(models)
            }
            Err(e) => {
                self.audit_model_listing(user_id, Err(&e))?;
                Err(e.into())
            }
        }
    }

    /// Admin-triggered matrix generation from scratch. The model's output
    /// goes through the same sanitization as a save; surviving warnings are
    /// returned alongside the allocated version.
    pub async fn generate_matrix(
        &self,
        llm: &RequestConfig,
        user_id: &str,
    ) -> Result<(String, Vec<String>), PipelineError> {
        let backend = ProviderClient::connect(llm).await?;
        self.generate_matrix_with_backend(&backend, user_id).await
    }

    pub async fn generate_matrix_with_backend(
        &self,
        backend: &impl ChatBackend,
        user_id: &str,
    ) -> Result<(String, Vec<String>), PipelineError> {
        let catalog = match self.content.load_matrix(None) {
            Ok(matrix) => matrix.attributes.clone(),
            Err(e) if e.is_not_found() => prompts::default_attribute_catalog(),
            Err(e) => return Err(e.into()),
        };

        let template = self.prompt_template(prompts::MATRIX_GENERATION_PROMPT_ID)?;
        let (parsed, _exchange) = matrix_eval::generate_matrix(backend, template.as_deref(), &catalog).await?;
        let sanitized = match parsed {
            ParseOutcome::Parsed(s) => s,
            ParseOutcome::Malformed { reason, .. } => {
                return Err(PipelineError::UnusableModelOutput(reason));
            }
        };

        let mut warnings = sanitized.warnings;
        let raw = serde_json::to_value(&sanitized.matrix).map_err(StoreError::from)?;
        let (receipt, save_warnings) = self.content.save_matrix(&raw, user_id, None)?;
        warnings.extend(save_warnings);
        Ok((receipt.version.to_string(), warnings))
    }

    pub fn sweep_idle_sessions(&self) -> Result<Vec<Uuid>, PipelineError> {
        Ok(self.sessions.sweep_idle(self.config.session_timeout, &self.audit)?)
    }

    // ── Core evaluation ─────────────────────────────────────────

    /// The `[evaluate]` state: get a fresh proposal, then route to a
    /// terminal classification or another clarification round.
    async fn evaluate(
        &self,
        backend: &impl ChatBackend,
        session: &mut Session,
        force_classify: bool,
    ) -> Result<SubmitOutcome, PipelineError> {
        let template = self.prompt_template(prompts::CLASSIFICATION_PROMPT_ID)?;
        let conversation_context = context::build_context(
            &session.description,
            &session.conversations,
            self.config.summarization_threshold,
        );

        let messages =
            classify::proposal_messages(template.as_deref(), &session.description, &conversation_context);
        let (parsed, exchange) = match classify::propose_with_repair(backend, messages.clone()).await {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail_session(backend, session, &messages, e)),
        };

        let (proposal, degraded) = match parsed {
            ParseOutcome::Parsed(p) => (p, false),
            ParseOutcome::Malformed { reason, .. } => {
                warn!(session = %session.session_id, error = %reason, "proposal unusable after repair, degrading");
                let category = session
                    .last_proposal
                    .as_ref()
                    .map(|c| c.category)
                    .unwrap_or(Category::Simplify);
                let proposal = Proposal {
                    category,
                    confidence: 0.0,
                    rationale: format!(
                        "Model response could not be parsed ({reason}); conservative default pending review."
                    ),
                    category_progression: String::new(),
                    future_opportunities: String::new(),
                    should_clarify: None,
                };
                (proposal, true)
            }
        };
        session.last_proposal = Some(build_classification(backend, &proposal, None));

        // Loop detection reads the audit history, not the session document:
        // it must survive crashes between the two.
        let recent = self
            .audit
            .recent_clarifications(session.session_id, self.config.silent_detection_window)?;
        let (loop_fired, empty_rounds) = clarify::loop_detected(&recent, self.config.empty_round_threshold);

        let questions_asked = session.questions_asked();
        let words = context::word_count(&session.description);
        let completeness = context::completeness_score(&session.description, &session.conversations);

        let terminal = if force_classify {
            Some(Terminal::Forced { questions_asked })
        } else if degraded {
            Some(Terminal::Manual)
        } else if loop_fired {
            warn!(session = %session.session_id, empty_rounds, "loop detected, forcing classification");
            Some(Terminal::Loop { empty_rounds })
        } else if questions_asked >= self.config.hard_limit_questions {
            Some(Terminal::Stopped(StopReason::HardLimit))
        } else if clarify::interview_exhausted(&recent, self.config.empty_round_threshold) {
            Some(Terminal::Stopped(StopReason::LlmExhausted))
        } else if proposal.confidence >= self.config.auto_classify_confidence
            && words >= self.config.min_description_words
            && completeness >= self.config.completeness_indicators_required
        {
            Some(Terminal::Auto)
        } else if proposal.should_clarify == Some(false)
            && proposal.confidence >= self.config.manual_review_confidence
        {
            Some(Terminal::Stopped(StopReason::LlmConfident))
        } else if proposal.confidence < self.config.manual_review_confidence {
            Some(Terminal::Manual)
        } else {
            None
        };

        match terminal {
            Some(terminal) => self.commit(backend, session, proposal, exchange, terminal).await,
            None => {
                self.run_clarification_round(backend, session, proposal, exchange, &conversation_context)
                    .await
            }
        }
    }

    /// Generate the next question batch and park the session in
    /// `clarifying`. Empty rounds are recorded like any other round.
    async fn run_clarification_round(
        &self,
        backend: &impl ChatBackend,
        session: &mut Session,
        proposal: Proposal,
        proposal_exchange: Exchange,
        conversation_context: &str,
    ) -> Result<SubmitOutcome, PipelineError> {
        let questions_asked = session.questions_asked();
        let template = self.prompt_template(prompts::CLARIFICATION_PROMPT_ID)?;

        let (messages, cap) = clarify::round_request(
            template.as_deref(),
            &session.description,
            conversation_context,
            questions_asked,
            self.config.soft_limit_questions,
        );
        let round = match clarify::next_questions(backend, messages.clone(), cap).await {
            Ok(round) => round,
            Err(e) => return Err(self.fail_session(backend, session, &messages, e)),
        };

        // Never hand out more questions than the hard limit leaves room for.
        let mut questions = round.questions;
        questions.truncate(self.config.hard_limit_questions - questions_asked);

        self.audit.append(
            &AuditEntry::for_session(session.session_id, AuditEventType::Clarification, &session.user_id)
                .with_data(json!({
                    "questions": questions,
                    "shouldClarify": round.should_clarify,
                    "metaCommentary": round.meta_commentary,
                    "questionsAskedTotal": questions_asked + questions.len(),
                }))
                .with_exchange(round.exchange.model_prompt(), round.exchange.raw_response.clone())
                .with_metadata(AuditMetadata {
                    model_version: Some(round.exchange.model.clone()),
                    llm_provider: Some(round.exchange.provider),
                    latency_ms: Some(round.exchange.latency_ms),
                    action: Some("clarification".into()),
                    ..AuditMetadata::default()
                }),
        )?;

        if !round.should_clarify {
            return self
                .commit(backend, session, proposal, proposal_exchange, Terminal::Stopped(StopReason::LlmConfident))
                .await;
        }

        session.push_turn(&questions);
        session.status = SessionStatus::Clarifying;
        self.sessions.save(session)?;

        Ok(SubmitOutcome {
            session_id: session.session_id,
            phase: Phase::Clarifying,
            classification: None,
            questions,
        })
    }

    /// Terminal path: extract attributes, apply the matrix, write the
    /// classification audit entry, then persist the session.
    async fn commit(
        &self,
        backend: &impl ChatBackend,
        session: &mut Session,
        proposal: Proposal,
        exchange: Exchange,
        terminal: Terminal,
    ) -> Result<SubmitOutcome, PipelineError> {
        let (evaluation, attributes) = self.apply_matrix(backend, session, &proposal).await?;
        let classification = build_classification(backend, &proposal, evaluation.as_ref());

        let flagged = evaluation.as_ref().is_some_and(|e| e.flagged_for_review);
        let status = if flagged || matches!(terminal, Terminal::Manual) {
            SessionStatus::ManualReview
        } else if self.config.require_admin_review {
            SessionStatus::PendingAdminReview
        } else {
            SessionStatus::Completed
        };

        let mut data = json!({
            "classification": classification,
            "attributes": attributes,
        });
        match &terminal {
            Terminal::Forced { questions_asked } => {
                data["interviewSkipped"] = json!(true);
                data["questionsAsked"] = json!(questions_asked);
            }
            Terminal::Loop { empty_rounds } => {
                data["emptyQuestionCount"] = json!(empty_rounds);
            }
            _ => {}
        }
        if flagged {
            data["flaggedForReview"] = json!(true);
        }

        self.audit.append(
            &AuditEntry::for_session(session.session_id, AuditEventType::Classification, &session.user_id)
                .with_data(data)
                .with_exchange(exchange.model_prompt(), exchange.raw_response.clone())
                .with_metadata(AuditMetadata {
                    model_version: Some(exchange.model.clone()),
                    llm_provider: Some(exchange.provider),
                    latency_ms: Some(exchange.latency_ms),
                    action: Some(terminal.action().into()),
                    loop_detected: matches!(terminal, Terminal::Loop { .. }).then_some(true),
                    reason: terminal.reason().map(Into::into),
                    ..AuditMetadata::default()
                }),
        )?;

        session.classification = Some(classification.clone());
        session.last_proposal = None;
        session.status = status;
        session.touch();
        self.sessions.save(session)?;

        info!(
            session = %session.session_id,
            category = %classification.category,
            confidence = classification.confidence,
            status = %status,
            action = terminal.action(),
            "session classified"
        );

        Ok(SubmitOutcome {
            session_id: session.session_id,
            phase: phase_for(status),
            classification: Some(classification),
            questions: Vec::new(),
        })
    }

    /// Attribute extraction plus matrix evaluation against the latest
    /// matrix. A missing matrix is not an error; extraction failures fill
    /// unknowns and never break the pipeline.
    async fn apply_matrix(
        &self,
        backend: &impl ChatBackend,
        session: &Session,
        proposal: &Proposal,
    ) -> Result<(Option<EvaluationOutcome>, BTreeMap<String, serde_json::Value>), PipelineError> {
        let matrix = match self.content.load_matrix(None) {
            Ok(matrix) => matrix,
            Err(e) if e.is_not_found() => return Ok((None, BTreeMap::new())),
            Err(e) => return Err(e.into()),
        };

        let template = self.prompt_template(prompts::EXTRACTION_PROMPT_ID)?;
        let (attributes, _exchange) = classify::extract_attributes(
            backend,
            template.as_deref(),
            &matrix.attributes,
            &session.description,
            &session.conversations,
        )
        .await;

        let evaluation = matrix_eval::evaluate(&matrix, &attributes, proposal.category, proposal.confidence);
        Ok((Some(evaluation), attributes))
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn load_session(&self, session_id: Uuid) -> Result<Session, PipelineError> {
        self.sessions.load(session_id).map_err(|e| {
            if e.is_not_found() {
                PipelineError::SessionNotFound(session_id)
            } else {
                e.into()
            }
        })
    }

    /// Stored prompt text when one exists; compiled-in default otherwise.
    fn prompt_template(&self, id: &str) -> Result<Option<String>, PipelineError> {
        match self.content.load_prompt(id, None) {
            Ok((text, _version)) => Ok(Some((*text).clone())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Final LLM failure: record the attempted prompt, fail the session,
    /// surface the error.
    fn fail_session(
        &self,
        backend: &impl ChatBackend,
        session: &mut Session,
        attempted: &[triage_llm::Message],
        e: LlmError,
    ) -> PipelineError {
        error!(session = %session.session_id, error = %e, "LLM failure after retries, failing session");

        let entry = AuditEntry::for_session(session.session_id, AuditEventType::Classification, &session.user_id)
            .with_data(json!({ "error": e.to_string() }))
            .with_exchange(
                serde_json::to_string(attempted).unwrap_or_default(),
                format!("ERROR: {e}"),
            )
            .with_metadata(AuditMetadata {
                model_version: Some(backend.model_name().to_string()),
                llm_provider: Some(backend.provider()),
                action: Some("llm_failure".into()),
                reason: Some(e.to_string()),
                ..AuditMetadata::default()
            });
        if let Err(store_err) = self.audit.append(&entry) {
            return store_err.into();
        }

        session.status = SessionStatus::Failed;
        session.touch();
        if let Err(store_err) = self.sessions.save(session) {
            return store_err.into();
        }
        PipelineError::Llm(e)
    }

    fn audit_model_listing(&self, user_id: &str, result: Result<usize, &LlmError>) -> Result<(), PipelineError> {
        let entry = match result {
            Ok(count) => AuditEntry::new(PUBLIC_SESSION, AuditEventType::ModelListSuccess, user_id)
                .with_data(json!({ "modelCount": count })),
            Err(e) => AuditEntry::new(PUBLIC_SESSION, AuditEventType::ModelListError, user_id)
                .with_data(json!({ "error": e.to_string() })),
        };
        self.audit.append(&entry)?;
        Ok(())
    }
}

fn build_classification(
    backend: &impl ChatBackend,
    proposal: &Proposal,
    evaluation: Option<&EvaluationOutcome>,
) -> Classification {
    Classification {
        category: evaluation.map(|e| e.category).unwrap_or(proposal.category),
        confidence: evaluation.map(|e| e.confidence).unwrap_or(proposal.confidence),
        rationale: proposal.rationale.clone(),
        category_progression: proposal.category_progression.clone(),
        future_opportunities: proposal.future_opportunities.clone(),
        timestamp: chrono::Utc::now(),
        model_used: backend.model_name().to_string(),
        llm_provider: backend.provider(),
        decision_matrix_evaluation: evaluation.map(|e| e.evaluation.clone()),
    }
}

fn phase_for(status: SessionStatus) -> Phase {
    match status {
        SessionStatus::ManualReview => Phase::ManualReview,
        SessionStatus::PendingAdminReview => Phase::PendingAdminReview,
        SessionStatus::Clarifying | SessionStatus::Pending => Phase::Clarifying,
        SessionStatus::Completed | SessionStatus::Failed => Phase::Classified,
    }
}
