//! Retry with a fixed wait for transient failures.
//!
//! Each attempt is made with identical parameters. Callers supply a predicate
//! deciding which errors are worth another attempt; anything else aborts the
//! loop immediately.
//!
//! # Example
//!
//! ```rust
//! use catalog_composite_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .wait_duration(Duration::from_millis(10))
//!     .build();
//!
//! let result = retry_with_predicate(
//!     &policy,
//!     || async { Ok::<_, String>(42) },
//!     |err: &String| err.contains("transient"),
//! )
//! .await;
//! assert_eq!(result.ok(), Some(42));
//! # }
//! ```

use crate::metrics::RetryMetrics;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Retry policy configuration.
///
/// # Default Values
///
/// - `max_attempts`: 3 (first call included)
/// - `wait_duration`: 1 second between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first call included
    pub max_attempts: usize,
    /// Pause between consecutive attempts
    pub wait_duration: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            wait_duration: None,
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            wait_duration: Duration::ZERO,
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<usize>,
    wait_duration: Option<Duration>,
}

impl RetryPolicyBuilder {
    /// Set maximum number of attempts (at least 1).
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub const fn wait_duration(mut self, wait: Duration) -> Self {
        self.wait_duration = Some(wait);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(3).max(1),
            wait_duration: self.wait_duration.unwrap_or(Duration::from_secs(1)),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("Operation failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made
        attempts: usize,
        /// Error of the final attempt
        last: E,
    },
    /// An attempt failed with an error that is not retryable
    #[error("{0}")]
    Aborted(E),
}

/// Retry an async operation while `is_retryable` holds.
///
/// # Errors
///
/// Returns [`RetryError::Aborted`] on the first non-retryable error and
/// [`RetryError::Exhausted`] once `max_attempts` retryable failures occurred.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    RetryMetrics::record_success();
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    tracing::debug!(error = %err, "Error is not retryable, failing immediately");
                    return Err(RetryError::Aborted(err));
                }

                if attempt >= policy.max_attempts {
                    RetryMetrics::record_exhausted();
                    tracing::warn!(attempt, error = %err, "Operation failed after max attempts");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                tracing::warn!(
                    attempt,
                    delay_ms = policy.wait_duration.as_millis(),
                    error = %err,
                    "Operation failed, retrying..."
                );
                RetryMetrics::record_attempt();
                sleep(policy.wait_duration).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .wait_duration(Duration::from_millis(10))
            .build()
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.wait_duration, Duration::from_secs(1));
        assert_eq!(RetryPolicy::builder().max_attempts(0).build().max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_first_try() {
        let counter = Arc::new(AtomicUsize::new(0));

        let result = retry_with_predicate(
            &RetryPolicy::default(),
            || {
                let c = Arc::clone(&counter);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(42)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let counter = Arc::new(AtomicUsize::new(0));

        let result = retry_with_predicate(
            &fast(3),
            || {
                let c = Arc::clone(&counter);
                async move {
                    let attempt = c.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(format!("Attempt {attempt} failed"))
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let counter = Arc::new(AtomicUsize::new(0));

        let result = retry_with_predicate(
            &fast(3),
            || {
                let c = Arc::clone(&counter);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>("transient")
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: "transient"
            })
        );
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_with_predicate_skips_non_retryable() {
        let counter = Arc::new(AtomicUsize::new(0));

        let result = retry_with_predicate(
            &RetryPolicy::default(),
            || {
                let c = Arc::clone(&counter);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>("permanent error")
                }
            },
            |err: &&str| err.contains("transient"),
        )
        .await;

        assert_eq!(result, Err(RetryError::Aborted("permanent error")));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let start = tokio::time::Instant::now();

        let _ = retry_with_predicate(
            &RetryPolicy::default(),
            || async { Err::<i32, _>("transient") },
            |_| true,
        )
        .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }
}
