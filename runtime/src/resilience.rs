//! Resilience policy: circuit breaker around retry around a per-attempt
//! timeout.
//!
//! ```text
//! breaker ──► retry ──► timeout ──► operation
//! ```
//!
//! The breaker sees one outcome per retried call. The caller decides what a
//! fallback looks like; [`ResilienceError::should_fallback`] tells it when to
//! run one.
//!
//! # Example
//!
//! ```rust,ignore
//! let policy = ResiliencePolicy::new(breaker, RetryPolicy::default(), Duration::from_secs(2));
//!
//! match policy.execute(|| transport.fetch_item(id, &options)).await {
//!     Ok(item) => item,
//!     Err(e) if e.should_fallback() => fallback_item(id)?,
//!     Err(e) => return Err(e.into_error()),
//! }
//! ```

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::retry::{RetryError, RetryPolicy, retry_with_predicate};
use catalog_composite_core::error::CompositeError;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors the policy knows how to classify.
pub trait PolicyError: fmt::Display + Sized {
    /// Error produced when an attempt exceeds its deadline.
    fn timed_out(after: Duration) -> Self;

    /// Whether another attempt with identical parameters may succeed.
    fn is_transient(&self) -> bool;

    /// Whether the breaker records this outcome as neither success nor failure.
    fn is_ignored_by_breaker(&self) -> bool;
}

impl PolicyError for CompositeError {
    fn timed_out(after: Duration) -> Self {
        Self::Timeout(format!(
            "Downstream call timed out after {}ms",
            after.as_millis()
        ))
    }

    fn is_transient(&self) -> bool {
        Self::is_transient(self)
    }

    fn is_ignored_by_breaker(&self) -> bool {
        Self::is_ignored_by_breaker(self)
    }
}

/// Why a guarded call did not produce a value.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResilienceError<E> {
    /// Breaker rejected the call without running it
    #[error("Circuit breaker '{breaker}' is open")]
    CircuitOpen {
        /// Name of the breaker
        breaker: String,
    },
    /// Every attempt failed with a transient error
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: usize,
        /// Error of the final attempt
        last: E,
    },
    /// An attempt failed with a permanent error
    #[error("{0}")]
    Failed(E),
}

impl<E> ResilienceError<E> {
    /// Whether a fallback should answer in place of the dependency.
    #[must_use]
    pub const fn should_fallback(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::RetriesExhausted { .. })
    }
}

impl ResilienceError<CompositeError> {
    /// Surface as a [`CompositeError`] when no fallback applies.
    #[must_use]
    pub fn into_error(self) -> CompositeError {
        match self {
            Self::CircuitOpen { breaker } => {
                CompositeError::CircuitOpen(format!("Circuit breaker for {breaker} is open"))
            }
            Self::RetriesExhausted { last, .. } | Self::Failed(last) => last,
        }
    }
}

/// Breaker, retry and timeout for one dependency.
#[derive(Debug, Clone)]
pub struct ResiliencePolicy {
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ResiliencePolicy {
    /// Compose a policy.
    #[must_use]
    pub const fn new(breaker: CircuitBreaker, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            breaker,
            retry,
            timeout,
        }
    }

    /// The breaker guarding this policy.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Retry settings.
    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Per-attempt deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `operation` under the policy.
    ///
    /// `operation` is invoked once per attempt.
    ///
    /// # Errors
    ///
    /// See [`ResilienceError`].
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: PolicyError,
    {
        let timeout = self.timeout;
        let attempt = || {
            let fut = operation();
            async move {
                tokio::time::timeout(timeout, fut)
                    .await
                    .unwrap_or_else(|_| Err(E::timed_out(timeout)))
            }
        };

        let result = self
            .breaker
            .call_classified(
                || retry_with_predicate(&self.retry, attempt, E::is_transient),
                |err: &RetryError<E>| match err {
                    RetryError::Exhausted { last, .. } => last.is_ignored_by_breaker(),
                    RetryError::Aborted(e) => e.is_ignored_by_breaker(),
                },
            )
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::Open) => Err(ResilienceError::CircuitOpen {
                breaker: self.breaker.name().to_string(),
            }),
            Err(CircuitBreakerError::Inner(RetryError::Exhausted { attempts, last })) => {
                Err(ResilienceError::RetriesExhausted { attempts, last })
            }
            Err(CircuitBreakerError::Inner(RetryError::Aborted(e))) => {
                Err(ResilienceError::Failed(e))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, State};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy() -> ResiliencePolicy {
        let breaker = CircuitBreaker::new(
            "item",
            CircuitBreakerConfig::builder()
                .sliding_window_size(2)
                .minimum_number_of_calls(2)
                .build(),
        );
        let retry = RetryPolicy::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(100))
            .build();
        ResiliencePolicy::new(breaker, retry, Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempts_time_out_and_exhaust_retries() {
        let policy = policy();
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<(), _> = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, CompositeError>(())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.should_fallback());
        assert!(matches!(
            err,
            ResilienceError::RetriesExhausted {
                attempts: 3,
                last: CompositeError::Timeout(_)
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_neither_retried_nor_counted() {
        let policy = policy();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let calls = Arc::clone(&calls);
            let result: Result<(), _> = policy
                .execute(move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(CompositeError::NotFound("nope".into()))
                    }
                })
                .await;
            let err = result.unwrap_err();
            assert!(!err.should_fallback());
            assert_eq!(err.into_error(), CompositeError::NotFound("nope".into()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(policy.breaker().state(), State::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_after_exhausted_calls() {
        let policy = policy();

        for _ in 0..2 {
            let _ = policy
                .execute(|| async { Err::<(), _>(CompositeError::Transport("refused".into())) })
                .await;
        }
        assert_eq!(policy.breaker().state(), State::Open);

        let result = policy.execute(|| async { Ok::<_, CompositeError>(1) }).await;
        let err = result.unwrap_err();
        assert!(err.should_fallback());
        assert!(matches!(err.into_error(), CompositeError::CircuitOpen(_)));
    }

    #[tokio::test]
    async fn test_upstream_error_fails_without_retry() {
        let policy = policy();
        let calls = AtomicUsize::new(0);

        let result = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(CompositeError::Upstream {
                        status: 500,
                        message: "boom".into(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::Failed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
