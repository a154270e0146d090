//! Bounded retry with explicit terminal states. Every model call path
//! ends in exactly one of success, exhaustion or cancellation; callers
//! translate the latter two into local degradation.

use crate::error::ModelError;
use crate::model::cancel::CancelToken;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Rate limits back off exponentially, everything else linearly.
    fn delay_for(&self, error: &ModelError, attempt: u32) -> Duration {
        match error {
            ModelError::RateLimited => Duration::from_secs(2_u64.pow(attempt.min(6))),
            _ => self.base_delay * attempt,
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: ModelError },
    Cancelled { attempts: u32 },
}

pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut attempt_fn: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let mut attempts = 0;
    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled { attempts };
        }
        attempts += 1;

        let result = tokio::select! {
            result = attempt_fn(attempts) => result,
            _ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts },
        };

        let error = match result {
            Ok(value) => return RetryOutcome::Success { value, attempts },
            Err(error) => error,
        };

        if !error.is_transient() || attempts >= policy.max_attempts.max(1) {
            return RetryOutcome::Exhausted {
                attempts,
                last_error: error,
            };
        }

        warn!(attempt = attempts, error = %error, "model call failed, retrying");
        let delay = policy.delay_for(&error, attempts);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return RetryOutcome::Cancelled { attempts },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn first_attempt_success_needs_no_retry() {
        let outcome = run_with_retry(&quick_policy(3), &CancelToken::new(), |_| async {
            Ok::<_, ModelError>(7)
        })
        .await;
        match outcome {
            RetryOutcome::Success { value, attempts } => {
                assert_eq!(value, 7);
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_errors_retry_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let outcome = run_with_retry(&quick_policy(5), &CancelToken::new(), move |_| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ModelError::Network("flaky".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert!(matches!(
            outcome,
            RetryOutcome::Success { value: 42, attempts: 3 }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_is_terminal() {
        let outcome = run_with_retry(&quick_policy(3), &CancelToken::new(), |_| async {
            Err::<(), _>(ModelError::Network("down".to_string()))
        })
        .await;
        match outcome {
            RetryOutcome::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last_error, ModelError::Network(_)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_transient_errors_do_not_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let outcome = run_with_retry(&quick_policy(5), &CancelToken::new(), move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ModelError::UnusableResponse("garbage".to_string()))
            }
        })
        .await;
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hung_attempt() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let outcome = run_with_retry(&quick_policy(3), &cancel, |_| async {
            std::future::pending::<Result<(), ModelError>>().await
        })
        .await;
        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 1 }));
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_all_attempts() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let outcome = run_with_retry(&quick_policy(3), &cancel, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 0 }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
