use thiserror::Error;
use triage_core::{MatrixError, SessionStatus, StoreError};
use triage_llm::LlmError;
use uuid::Uuid;

/// Failure kinds surfaced by the pipeline. Malformed model output is
/// deliberately absent: it is recovered locally (empty rounds, degraded
/// proposals) and never crosses this boundary, except for admin-triggered
/// generation where there is nothing to degrade to.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("session {session} is {status}, which does not allow this operation")]
    InvalidState { session: Uuid, status: SessionStatus },

    #[error("session {0} has no description to classify")]
    NoDescription(Uuid),

    #[error("model output could not be used: {0}")]
    UnusableModelOutput(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}
