//! Prometheus metrics for the resilience and publish machinery.
//!
//! Components record through the small recorder types below; the exporter
//! renders everything in Prometheus text format for `GET /metrics`.
//!
//! - Circuit breaker state and call outcomes, per dependency
//! - Retry attempts and exhaustion
//! - Publish pool submissions and broker hand-offs, per topic
//! - Downstream fallbacks and degraded secondary reads
//!
//! # Example
//!
//! ```rust,no_run
//! use catalog_composite_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! let text = exporter.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus exporter installed as the global metrics recorder.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this
    /// succeeds without a handle and [`render`](Self::render) returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Circuit Breaker Metrics
    describe_gauge!(
        "circuit_breaker_state",
        "Current circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_counter!(
        "circuit_breaker_calls_total",
        "Total number of calls through circuit breaker"
    );
    describe_counter!(
        "circuit_breaker_successes_total",
        "Total number of successful calls"
    );
    describe_counter!(
        "circuit_breaker_failures_total",
        "Total number of failed calls"
    );
    describe_counter!(
        "circuit_breaker_rejections_total",
        "Total number of rejected calls (circuit open)"
    );

    // Retry Metrics
    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!(
        "retry_successes_total",
        "Total number of operations that succeeded after retrying"
    );
    describe_counter!(
        "retry_exhausted_total",
        "Total number of operations that exhausted their attempts"
    );

    // Publish Metrics
    describe_counter!(
        "publish_submitted_total",
        "Total number of events accepted by the publish pool"
    );
    describe_counter!(
        "publish_rejected_total",
        "Total number of events rejected because the pool queue was full"
    );
    describe_counter!(
        "publish_published_total",
        "Total number of events accepted by the event channel"
    );
    describe_counter!(
        "publish_failed_total",
        "Total number of events the event channel refused"
    );
    describe_histogram!(
        "publish_duration_seconds",
        "Time from worker pickup to channel acknowledgement"
    );

    // Downstream Metrics
    describe_counter!(
        "downstream_fallbacks_total",
        "Total number of primary reads answered by the fallback"
    );
    describe_counter!(
        "downstream_degraded_reads_total",
        "Total number of secondary reads degraded to an empty result"
    );
}

/// Circuit breaker metrics recorder.
pub struct CircuitBreakerMetrics;

impl CircuitBreakerMetrics {
    /// Record circuit breaker state.
    ///
    /// 0 = Closed, 1 = `HalfOpen`, 2 = Open
    pub fn record_state(breaker: &str, state: f64) {
        gauge!("circuit_breaker_state", "breaker" => breaker.to_string()).set(state);
    }

    /// Record a call attempt.
    pub fn record_call(breaker: &str) {
        counter!("circuit_breaker_calls_total", "breaker" => breaker.to_string()).increment(1);
    }

    /// Record a successful call.
    pub fn record_success(breaker: &str) {
        counter!("circuit_breaker_successes_total", "breaker" => breaker.to_string()).increment(1);
    }

    /// Record a failed call.
    pub fn record_failure(breaker: &str) {
        counter!("circuit_breaker_failures_total", "breaker" => breaker.to_string()).increment(1);
    }

    /// Record a rejected call.
    pub fn record_rejection(breaker: &str) {
        counter!("circuit_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a success after at least one retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}

/// Publish pool metrics recorder.
pub struct PublishMetrics;

impl PublishMetrics {
    /// Record an event queued on a worker.
    pub fn record_submitted(topic: &str) {
        counter!("publish_submitted_total", "topic" => topic.to_string()).increment(1);
    }

    /// Record an event turned away by a full queue.
    pub fn record_rejected(topic: &str) {
        counter!("publish_rejected_total", "topic" => topic.to_string()).increment(1);
    }

    /// Record a channel acknowledgement.
    pub fn record_published(topic: &str, duration: Duration) {
        counter!("publish_published_total", "topic" => topic.to_string()).increment(1);
        histogram!("publish_duration_seconds", "topic" => topic.to_string())
            .record(duration.as_secs_f64());
    }

    /// Record a channel refusal.
    pub fn record_failed(topic: &str) {
        counter!("publish_failed_total", "topic" => topic.to_string()).increment(1);
    }
}

/// Downstream read metrics recorder.
pub struct DownstreamMetrics;

impl DownstreamMetrics {
    /// Record a primary read answered by the fallback.
    pub fn record_fallback(dependency: &str) {
        counter!("downstream_fallbacks_total", "dependency" => dependency.to_string()).increment(1);
    }

    /// Record a secondary read degraded to empty.
    pub fn record_degraded_read(dependency: &str) {
        counter!("downstream_degraded_reads_total", "dependency" => dependency.to_string())
            .increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_creation() {
        let exporter = MetricsExporter::new();
        assert!(exporter.handle().is_none());
        assert!(exporter.render().is_none());
    }

    #[test]
    fn test_exporter_renders_recorded_metrics() {
        let mut exporter = MetricsExporter::new();
        exporter.install().unwrap();

        CircuitBreakerMetrics::record_state("item", 0.0);
        CircuitBreakerMetrics::record_call("item");
        PublishMetrics::record_submitted("items");
        PublishMetrics::record_published("items", Duration::from_millis(5));
        DownstreamMetrics::record_degraded_read("ratings");

        // Another test may have installed the recorder first
        if let Some(rendered) = exporter.render() {
            assert!(rendered.contains("circuit_breaker_state"));
            assert!(rendered.contains("circuit_breaker_calls_total"));
            assert!(rendered.contains("publish_published_total"));
            assert!(rendered.contains("downstream_degraded_reads_total"));
        }
    }
}
