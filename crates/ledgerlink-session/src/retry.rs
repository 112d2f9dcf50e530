//! Bounded retry with exponential backoff under an overall deadline.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, SessionError};

/// Default number of attempts for upstream calls.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Default overall deadline for one upstream operation, retries included.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Retry policy for calls to the external provider.
///
/// Only upstream-class errors ([`SessionError::is_upstream`]) are retried.
/// The delay doubles after each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once with no deadline beyond `deadline`.
    pub fn no_retry(deadline: Duration) -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            deadline,
        }
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }

    /// Run `op` until it succeeds, fails with a non-upstream error, runs out
    /// of attempts, or the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Upstream`] once attempts are exhausted or the
    /// deadline elapses; non-upstream errors are returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);

        let attempts = async {
            let mut last_error = None;
            for attempt in 1..=max_attempts {
                if attempt > 1 {
                    let delay = self.backoff_for(attempt - 1);
                    tracing::debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                }

                match op().await {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_upstream() => {
                        tracing::warn!(operation, attempt, error = %e, "upstream attempt failed");
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(SessionError::Upstream {
                reason: format!(
                    "{operation} failed after {max_attempts} attempts: {}",
                    last_error.map(|e| e.to_string()).unwrap_or_default()
                ),
            })
        };

        match tokio::time::timeout(self.deadline, attempts).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Upstream {
                reason: format!(
                    "{operation} exceeded deadline of {} ms",
                    self.deadline.as_millis()
                ),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::TokenError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            deadline: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("exchange", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(SessionError::upstream("HTTP 503"))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(2)
            .run("exchange", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SessionError::upstream("HTTP 500"))
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, SessionError::Upstream { .. }));
        assert!(err.to_string().contains("after 2 attempts"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_upstream_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(5)
            .run("exchange", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SessionError::from(TokenError::Malformed))
            })
            .await;
        assert!(matches!(result, Err(SessionError::Token(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_bounds_slow_calls() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            deadline: Duration::from_millis(50),
        };
        let result: Result<()> = policy
            .run("exchange", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            deadline: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
    }
}
