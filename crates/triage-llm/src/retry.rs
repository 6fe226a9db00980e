use crate::LlmError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// At-least-once call policy: up to `max_attempts` tries, exponential
/// backoff between them, a hard timeout on each attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Run `op` under the policy. Non-retryable errors propagate immediately;
/// a retryable error on the final attempt is wrapped in `RetriesExhausted`.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut delay = policy.base_delay;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        let result = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(label, attempt, error = %e, "retryable failure, backing off");
            }
            Err(e) if e.is_retryable() => {
                return Err(LlmError::RetriesExhausted {
                    attempts: policy.max_attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Http { status: 503, body: "busy".into() })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Http { status: 400, body: "bad request".into() }) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Http { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_wraps_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Http { status: 429, body: "rate limited".into() }) }
        })
        .await;
        match result {
            Err(LlmError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, LlmError::Http { status: 429, .. }));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_timeout_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(())
            }
        })
        .await;
        match result {
            Err(LlmError::RetriesExhausted { last, .. }) => {
                assert!(matches!(*last, LlmError::Timeout(_)));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
