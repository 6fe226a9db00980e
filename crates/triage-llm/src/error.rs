use std::time::Duration;
use thiserror::Error;

/// Provider-facing failures. Retryability follows the transport contract:
/// HTTP 429, HTTP ≥ 500, resets and timeouts may be retried; everything
/// else fails the attempt outright.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider rejected the call ({code}): {message}")]
    Provider {
        code: String,
        message: String,
        retryable: bool,
    },

    #[error("provider returned no content")]
    EmptyResponse,

    #[error("invalid provider configuration: {0}")]
    Config(String),

    #[error("all {attempts} attempts failed, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http { status, .. } => *status == 429 || *status >= 500,
            LlmError::Timeout(_) | LlmError::Transport(_) => true,
            LlmError::Provider { retryable, .. } => *retryable,
            LlmError::EmptyResponse
            | LlmError::Config(_)
            | LlmError::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(LlmError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(LlmError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!LlmError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::Http { status: 404, body: String::new() }.is_retryable());
        assert!(!LlmError::Config("no region".into()).is_retryable());
    }
}
