//! # Catalog Composite Runtime
//!
//! Resilience and publish machinery for the catalog composite.
//!
//! ## Core Components
//!
//! - **Circuit breaker**: count-based sliding window, lazy half-open probing
//! - **Retry**: fixed-wait retry for transient errors
//! - **Resilience policy**: breaker around retry around a per-attempt timeout
//! - **Publish pool**: bounded, key-sharded workers feeding the event channel
//! - **Metrics**: Prometheus exporter and per-component recorders
//!
//! ## Example
//!
//! ```ignore
//! use catalog_composite_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use catalog_composite_runtime::resilience::ResiliencePolicy;
//! use catalog_composite_runtime::retry::RetryPolicy;
//!
//! let policy = ResiliencePolicy::new(
//!     CircuitBreaker::new("item", CircuitBreakerConfig::default()),
//!     RetryPolicy::default(),
//!     Duration::from_secs(2),
//! );
//!
//! let item = policy.execute(|| transport.fetch_item(id, &options)).await?;
//! ```

/// Fixed-wait retry for transient failures
pub mod retry;

/// Circuit breaker for preventing cascading failures
pub mod circuit_breaker;

/// Breaker, retry and timeout composed for one dependency
pub mod resilience;

/// Bounded worker pool for event publication
pub mod publish_pool;

/// Prometheus metrics for observability
pub mod metrics;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use publish_pool::{PublishPool, PublishPoolConfig, PublishReceipt, SubmissionError};
pub use resilience::{PolicyError, ResilienceError, ResiliencePolicy};
pub use retry::{RetryError, RetryPolicy};
