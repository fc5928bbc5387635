//! Bounded retry with exponential backoff.
//!
//! The executor runs an async operation up to a fixed attempt cap. No
//! delay precedes the first attempt; before each subsequent attempt it
//! sleeps for `base_delay * multiplier^(attempt - 1)`, capped at
//! `max_delay`. The backoff sleep is a cancellation point: dropping the
//! returned future during the sleep aborts before the next attempt runs.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up
    pub max_attempts: u32,
    /// Base delay before the second attempt
    pub base_delay: Duration,
    /// Cap applied to every computed delay
    pub max_delay: Duration,
    /// Backoff multiplier (e.g. 2.0 for doubling)
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay applied before the given attempt (1-based; attempt 1 has none).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = self.multiplier.powi((attempt - 2) as i32);
        let delay = self.base_delay.mul_f64(exp);
        delay.min(self.max_delay)
    }
}

/// Failure after the attempt cap was exhausted.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed after {attempts} attempts: {source}")]
pub struct RetryError<E: std::error::Error> {
    /// Name of the operation, for the caller's error chain
    pub operation: String,
    /// How many attempts ran before giving up
    pub attempts: u32,
    /// The last underlying failure
    #[source]
    pub source: E,
}

/// Run `op` until it succeeds or the attempt cap is exhausted.
///
/// Every error is treated as retryable. The last cause is returned
/// wrapped with the attempt count once the cap is reached.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        let delay = policy.backoff_delay(attempt);
        if !delay.is_zero() {
            debug!(operation, attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(operation, attempt, error = %err, "attempt failed");
                last_err = Some(err);
            }
        }
    }

    let attempts = policy.max_attempts.max(1);
    // The loop body ran at least once, so an error is always present here.
    match last_err {
        Some(source) => Err(RetryError {
            operation: operation.to_string(),
            attempts,
            source,
        }),
        None => unreachable!("retry loop always records an error before exhausting"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("transient")]
    struct Transient;

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[test]
    fn backoff_table_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff_delay(1), Duration::ZERO);
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(6), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn returns_first_success_without_delay() {
        let calls = AtomicU32::new(0);
        let result = retry(&quick_policy(3), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Transient>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry(&quick_policy(3), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Transient)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_reports_attempts_and_last_cause() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&quick_policy(3), "upload", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Transient) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("upload failed after 3 attempts"));
    }
}
