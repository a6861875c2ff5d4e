//! Application state for the composite HTTP server.

use crate::aggregator::Aggregator;
use crate::health::HealthAggregator;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Aggregate create, read and delete
    pub aggregator: Aggregator,
    /// Dependency health probes
    pub health: HealthAggregator,
    /// Prometheus renderer, when this process installed the recorder
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(
        aggregator: Aggregator,
        health: HealthAggregator,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            aggregator,
            health,
            metrics,
        }
    }
}
