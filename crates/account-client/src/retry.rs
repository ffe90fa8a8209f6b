//! Retry with linear backoff for backend calls.
//!
//! Only errors flagged retryable (`Unavailable`, `DeadlineExceeded`) are
//! retried, and only for operations the adapter has cleared for retry.
//! Everything else is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use account_core::AccountError;

/// Default number of attempts, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff step; attempt `n` waits `n * BACKOFF_STEP` before the next try.
pub const BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Attempt budget and backoff for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff_step: BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_step: Duration::ZERO,
        }
    }

    /// Delay after failed attempt `attempt` (1-based): 100ms, 200ms, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Outcome of a retried call.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, AccountError>,
    pub attempts: u32,
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. Attempts run strictly one after another.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, operation: &str, f: F) -> Attempted<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AccountError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    code = err.code(),
                    "account backend call failed, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Attempted {
                    result: Err(err),
                    attempts: attempt,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use account_core::{ErrorKind, DOMAIN_ACCOUNT};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn unavailable() -> AccountError {
        AccountError::external_service(DOMAIN_ACCOUNT, "account_rpc", "find_by_id", true)
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_errors_exhaust_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let started = tokio::time::Instant::now();

        let outcome: Attempted<()> = retry_with_backoff(RetryPolicy::default(), "find_by_id", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            }
        })
        .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, MAX_ATTEMPTS);
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
        // 100ms after the first failure, 200ms after the second.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_return_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let outcome: Attempted<()> = retry_with_backoff(RetryPolicy::default(), "find_by_id", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(AccountError::new(ErrorKind::NotFound, "not_found", "missing"))
            }
        })
        .await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let outcome = retry_with_backoff(RetryPolicy::default(), "find_by_id", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(unavailable())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_one_attempt() {
        let outcome: Attempted<()> =
            retry_with_backoff(RetryPolicy::no_retry(), "register", || async { Err(unavailable()) }).await;
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }
}
