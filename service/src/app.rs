//! Explicit wiring of the composite from its configuration.

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::health::HealthAggregator;
use crate::integration::DownstreamClient;
use crate::publisher::{EventPublisher, Topics};
use crate::server::{AppState, build_router};
use axum::Router;
use catalog_composite_core::catalog::{CatalogTransport, Dependency};
use catalog_composite_core::environment::Clock;
use catalog_composite_core::event_bus::EventBus;
use catalog_composite_runtime::{CircuitBreaker, PublishPool, ResiliencePolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// The assembled composite: HTTP state plus the publish pool it feeds.
pub struct CompositeApp {
    state: AppState,
    publisher: EventPublisher,
}

impl CompositeApp {
    /// Wire every component.
    ///
    /// Spawns the publish pool, so it must be called from within a tokio
    /// runtime.
    #[must_use]
    pub fn new(
        config: &Config,
        transport: Arc<dyn CatalogTransport>,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let pool = PublishPool::new(bus, config.publish_pool());
        let topics = Topics {
            items: config.redpanda.items_topic.clone(),
            ratings: config.redpanda.ratings_topic.clone(),
            commentary: config.redpanda.commentary_topic.clone(),
        };
        let publisher = EventPublisher::new(Arc::new(pool), topics, clock);

        let policy = ResiliencePolicy::new(
            CircuitBreaker::new(Dependency::Item.as_str(), config.circuit_breaker()),
            config.retry_policy(),
            config.resilience.item_timeout,
        );
        let client = DownstreamClient::new(
            Arc::clone(&transport),
            policy,
            publisher.clone(),
            config.server.service_address.clone(),
        );

        let state = AppState::new(
            Aggregator::new(client),
            HealthAggregator::new(transport, config.downstream.health_timeout),
            metrics,
        );

        Self { state, publisher }
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Router serving this app.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Drain queued events and stop the publish pool.
    ///
    /// Routers built from this app must be dropped first.
    pub async fn shutdown(self) {
        drop(self.state);
        self.publisher.shutdown().await;
    }
}
