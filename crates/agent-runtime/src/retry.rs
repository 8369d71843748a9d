//! Retry logic with linear backoff
//!
//! The policy is generic over the error type; callers decide which errors are
//! worth another attempt.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Retry `n` waits `step * n`
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(2, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    pub fn linear(max_retries: u32, step: Duration) -> Self {
        Self { max_retries, step }
    }

    /// Create a policy with no retries
    pub fn none() -> Self {
        Self::linear(0, Duration::ZERO)
    }

    /// Total number of attempts the policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_duration(&self, retry: u32) -> Duration {
        self.step.saturating_mul(retry)
    }

    /// Execute an async operation with retry logic
    ///
    /// Returns the final result together with the number of attempts made.
    /// Errors for which `is_retryable` is false are returned immediately.
    pub async fn execute<T, E, F, Fut, R>(
        &self,
        operation_name: &str,
        is_retryable: R,
        mut operation: F,
    ) -> (Result<T, E>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "succeeded after retry");
                    }
                    return (Ok(value), attempt);
                }
                Err(e) if attempt < self.max_attempts() && is_retryable(&e) => {
                    let backoff = self.backoff_duration(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = self.max_attempts(),
                        error = %e,
                        "attempt failed, retrying in {backoff:?}"
                    );
                    sleep(backoff).await;
                }
                Err(e) => {
                    debug!(operation = operation_name, attempt, error = %e, "giving up");
                    return (Err(e), attempt);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::linear(2, Duration::from_millis(1))
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::linear(2, Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let (result, attempts) = fast()
            .execute("flaky", |_: &String| true, || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("connection reset".to_string())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_bounded_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let (result, attempts): (Result<(), String>, u32) = fast()
            .execute("down", |_| true, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("still down".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let (result, attempts): (Result<(), String>, u32) = tokio_test::block_on(fast().execute(
            "rejected",
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("duplicate".to_string()) }
            },
        ));

        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_none_policy() {
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }
}
