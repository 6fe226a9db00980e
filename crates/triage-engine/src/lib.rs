pub mod classify;
pub mod clarify;
pub mod context;
pub mod matrix_eval;
pub mod orchestrator;
pub mod prompts;
mod error;

#[cfg(any(test, feature = "test-stubs"))]
pub mod test_support;

pub use error::PipelineError;
pub use orchestrator::{
    Phase, Pipeline, ReclassifyOutcome, SubmitOutcome, SubmitRequest,
};
