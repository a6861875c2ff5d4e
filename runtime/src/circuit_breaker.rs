//! Circuit breaker with a count-based sliding window.
//!
//! The breaker records the outcome of the last `sliding_window_size` calls and
//! opens when, with at least `minimum_number_of_calls` recorded, the share of
//! failures reaches `failure_rate_threshold` percent.
//!
//! # States
//!
//! - **Closed**: Normal operation. Calls pass through, outcomes are recorded.
//! - **Open**: Calls are rejected until `wait_duration_in_open_state` has
//!   elapsed. The transition to `HalfOpen` is checked lazily on the next call.
//! - **HalfOpen**: Up to `permitted_calls_in_half_open_state` trial calls are
//!   let through. All of them succeeding closes the circuit; any failure opens
//!   it again. Further calls are rejected as if open.
//!
//! Errors the caller classifies as ignored (see [`CircuitBreaker::call_classified`])
//! count as neither success nor failure.
//!
//! # Example
//!
//! ```rust
//! use catalog_composite_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig::builder()
//!     .sliding_window_size(5)
//!     .minimum_number_of_calls(5)
//!     .failure_rate_threshold(50)
//!     .wait_duration_in_open_state(Duration::from_secs(10))
//!     .permitted_calls_in_half_open_state(3)
//!     .build();
//!
//! let breaker = CircuitBreaker::new("item", config);
//!
//! match breaker.call(|| async { Ok::<_, String>(42) }).await {
//!     Ok(result) => println!("Success: {result}"),
//!     Err(e) => println!("Failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::metrics::CircuitBreakerMetrics;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept in the window
    pub sliding_window_size: usize,
    /// Outcomes required before the failure rate is evaluated
    pub minimum_number_of_calls: usize,
    /// Failure percentage (0..=100) at which the circuit opens
    pub failure_rate_threshold: u8,
    /// How long the circuit stays open before allowing trial calls
    pub wait_duration_in_open_state: Duration,
    /// Number of trial calls admitted while half-open
    pub permitted_calls_in_half_open_state: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            sliding_window_size: None,
            minimum_number_of_calls: None,
            failure_rate_threshold: None,
            wait_duration_in_open_state: None,
            permitted_calls_in_half_open_state: None,
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    sliding_window_size: Option<usize>,
    minimum_number_of_calls: Option<usize>,
    failure_rate_threshold: Option<u8>,
    wait_duration_in_open_state: Option<Duration>,
    permitted_calls_in_half_open_state: Option<usize>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the sliding window size (at least 1).
    #[must_use]
    pub const fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = Some(size);
        self
    }

    /// Set the minimum number of recorded calls before evaluating.
    #[must_use]
    pub const fn minimum_number_of_calls(mut self, calls: usize) -> Self {
        self.minimum_number_of_calls = Some(calls);
        self
    }

    /// Set the failure rate threshold in percent (capped at 100).
    #[must_use]
    pub const fn failure_rate_threshold(mut self, percent: u8) -> Self {
        self.failure_rate_threshold = Some(percent);
        self
    }

    /// Set how long the circuit stays open.
    #[must_use]
    pub const fn wait_duration_in_open_state(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open_state = Some(duration);
        self
    }

    /// Set the number of trial calls admitted while half-open (at least 1).
    #[must_use]
    pub const fn permitted_calls_in_half_open_state(mut self, calls: usize) -> Self {
        self.permitted_calls_in_half_open_state = Some(calls);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        let sliding_window_size = self.sliding_window_size.unwrap_or(5).max(1);
        CircuitBreakerConfig {
            sliding_window_size,
            minimum_number_of_calls: self
                .minimum_number_of_calls
                .unwrap_or(5)
                .clamp(1, sliding_window_size),
            failure_rate_threshold: self.failure_rate_threshold.unwrap_or(50).min(100),
            wait_duration_in_open_state: self
                .wait_duration_in_open_state
                .unwrap_or(Duration::from_secs(10)),
            permitted_calls_in_half_open_state: self
                .permitted_calls_in_half_open_state
                .unwrap_or(3)
                .max(1),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately
    Open,
    /// Circuit is half-open, testing if the dependency recovered
    HalfOpen,
}

impl State {
    /// Gauge value: 0 = Closed, 1 = `HalfOpen`, 2 = Open
    #[must_use]
    pub const fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

/// Errors from circuit breaker operations.
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open (or half-open with no permits left), call rejected
    #[error("Circuit breaker is open")]
    Open,
    /// Operation failed
    #[error("Operation failed: {0}")]
    Inner(E),
}

/// How a call's outcome is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Ignored,
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: State,
    /// Bumped on every transition; permits from an older generation are stale
    generation: u64,
    /// `true` marks a failure
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_admitted: usize,
    half_open_successes: usize,
}

/// Admission of one call.
///
/// Dropping an unsettled half-open permit gives it back, so a cancelled
/// trial call never holds a permit.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    half_open: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(outcome, self.generation);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.settled || !self.half_open {
            return;
        }
        tracing::debug!(
            breaker = %self.breaker.name,
            "Half-open trial call dropped, returning permit"
        );
        self.breaker.release(self.generation);
    }
}

/// Circuit breaker for one dependency.
///
/// Cheap to clone; clones share state. The state lock is never held across
/// an await point.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
    // Metrics
    total_calls: Arc<AtomicU64>,
    total_successes: Arc<AtomicU64>,
    total_failures: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker named after the dependency it guards.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        let window = VecDeque::with_capacity(config.sliding_window_size);
        let breaker = Self {
            name: name.into(),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: State::Closed,
                generation: 0,
                window,
                opened_at: None,
                half_open_admitted: 0,
                half_open_successes: 0,
            })),
            total_calls: Arc::new(AtomicU64::new(0)),
            total_successes: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        };
        CircuitBreakerMetrics::record_state(&breaker.name, State::Closed.gauge_value());
        breaker
    }

    /// Name of the guarded dependency.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state of the circuit breaker.
    ///
    /// Does not perform the lazy `Open -> HalfOpen` transition.
    #[must_use]
    pub fn state(&self) -> State {
        self.lock().state
    }

    /// Call an operation through the circuit breaker, counting every error as
    /// a failure.
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError::Open` if the call is rejected.
    /// Returns `CircuitBreakerError::Inner` if the operation fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.call_classified(operation, |_| false).await
    }

    /// Call an operation through the circuit breaker; errors for which
    /// `is_ignored` returns `true` are neither successes nor failures.
    ///
    /// Dropping the returned future before it completes records nothing.
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError::Open` if the call is rejected.
    /// Returns `CircuitBreakerError::Inner` if the operation fails.
    pub async fn call_classified<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_ignored: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        CircuitBreakerMetrics::record_call(&self.name);

        let Some(permit) = self.try_acquire() else {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            CircuitBreakerMetrics::record_rejection(&self.name);
            tracing::warn!(breaker = %self.name, "Circuit breaker is OPEN, rejecting call");
            return Err(CircuitBreakerError::Open);
        };

        match operation().await {
            Ok(result) => {
                permit.settle(Outcome::Success);
                self.total_successes.fetch_add(1, Ordering::Relaxed);
                CircuitBreakerMetrics::record_success(&self.name);
                Ok(result)
            }
            Err(err) => {
                if is_ignored(&err) {
                    permit.settle(Outcome::Ignored);
                } else {
                    permit.settle(Outcome::Failure);
                    self.total_failures.fetch_add(1, Ordering::Relaxed);
                    CircuitBreakerMetrics::record_failure(&self.name);
                }
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may proceed, taking a half-open permit if needed.
    fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.lock();

        if state.state == State::Open {
            let elapsed = state
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.wait_duration_in_open_state);
            if !elapsed {
                return None;
            }
            tracing::info!(breaker = %self.name, "Circuit breaker transitioning OPEN -> HALF_OPEN");
            self.transition(&mut state, State::HalfOpen);
        }

        let half_open = match state.state {
            State::Closed => false,
            State::HalfOpen => {
                if state.half_open_admitted >= self.config.permitted_calls_in_half_open_state {
                    return None;
                }
                state.half_open_admitted += 1;
                true
            }
            State::Open => return None,
        };

        Some(Permit {
            breaker: self,
            generation: state.generation,
            half_open,
            settled: false,
        })
    }

    /// Return a half-open permit taken in `generation`.
    fn release(&self, generation: u64) {
        let mut state = self.lock();
        if state.state == State::HalfOpen && state.generation == generation {
            state.half_open_admitted = state.half_open_admitted.saturating_sub(1);
        }
    }

    fn record(&self, outcome: Outcome, generation: u64) {
        let mut state = self.lock();

        match state.state {
            State::Closed => {
                if outcome == Outcome::Ignored {
                    return;
                }
                if state.window.len() == self.config.sliding_window_size {
                    state.window.pop_front();
                }
                state.window.push_back(outcome == Outcome::Failure);

                let recorded = state.window.len();
                if recorded < self.config.minimum_number_of_calls {
                    return;
                }
                let failures = state.window.iter().filter(|failed| **failed).count();
                if failures * 100 >= usize::from(self.config.failure_rate_threshold) * recorded {
                    tracing::warn!(
                        breaker = %self.name,
                        failures,
                        recorded,
                        threshold = self.config.failure_rate_threshold,
                        "Circuit breaker transitioning CLOSED -> OPEN"
                    );
                    self.transition(&mut state, State::Open);
                }
            }
            // Only trial calls admitted in this half-open period count
            State::HalfOpen if state.generation != generation => {}
            State::HalfOpen => match outcome {
                Outcome::Success => {
                    state.half_open_successes += 1;
                    if state.half_open_successes >= self.config.permitted_calls_in_half_open_state {
                        tracing::info!(
                            breaker = %self.name,
                            successes = state.half_open_successes,
                            "Circuit breaker transitioning HALF_OPEN -> CLOSED"
                        );
                        self.transition(&mut state, State::Closed);
                    }
                }
                Outcome::Failure => {
                    tracing::warn!(
                        breaker = %self.name,
                        "Circuit breaker transitioning HALF_OPEN -> OPEN (recovery failed)"
                    );
                    self.transition(&mut state, State::Open);
                }
                // Give the permit back so another trial can run
                Outcome::Ignored => {
                    state.half_open_admitted = state.half_open_admitted.saturating_sub(1);
                }
            },
            // A call admitted before another one opened the circuit
            State::Open => {}
        }
    }

    fn transition(&self, state: &mut CircuitBreakerState, to: State) {
        state.state = to;
        state.generation += 1;
        state.window.clear();
        state.half_open_admitted = 0;
        state.half_open_successes = 0;
        state.opened_at = (to == State::Open).then(Instant::now);
        CircuitBreakerMetrics::record_state(&self.name, to.gauge_value());
    }

    /// Get circuit breaker counters.
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    /// Force the circuit open, as if the failure threshold had been reached.
    pub fn trip(&self) {
        let mut state = self.lock();
        tracing::warn!(breaker = %self.name, "Circuit breaker manually forced OPEN");
        self.transition(&mut state, State::Open);
    }

    /// Reset the circuit breaker to closed state.
    ///
    /// Useful for testing or manual intervention.
    pub fn reset(&self) {
        let mut state = self.lock();
        tracing::info!(breaker = %self.name, "Circuit breaker manually reset to CLOSED");
        self.transition(&mut state, State::Closed);
    }
}

/// Counters for circuit breaker monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    /// Total number of calls attempted
    pub total_calls: u64,
    /// Total number of successful calls
    pub total_successes: u64,
    /// Total number of failed calls (ignored errors excluded)
    pub total_failures: u64,
    /// Total number of rejected calls
    pub total_rejections: u64,
}
