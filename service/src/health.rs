//! Composite health of the dependent services.
//!
//! Probes every dependency's `/health` endpoint in parallel. A probe that
//! errors or exceeds the deadline reports `DOWN`; the composite document is
//! always produced.

use catalog_composite_core::catalog::{CatalogTransport, Dependency};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Liveness of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Probe succeeded
    Up,
    /// Probe failed or timed out
    Down,
}

/// Health entry of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Probe outcome
    pub status: Status,
}

/// Composite health document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeHealth {
    /// Item service
    pub item: ComponentHealth,
    /// Ratings service
    pub ratings: ComponentHealth,
    /// Commentary service
    pub commentary: ComponentHealth,
}

impl CompositeHealth {
    /// Whether every dependency is up.
    #[must_use]
    pub fn all_up(&self) -> bool {
        [self.item, self.ratings, self.commentary]
            .iter()
            .all(|c| c.status == Status::Up)
    }
}

/// Folds dependency probes into one document.
#[derive(Clone)]
pub struct HealthAggregator {
    transport: Arc<dyn CatalogTransport>,
    timeout: Duration,
}

impl HealthAggregator {
    /// Create an aggregator probing through `transport` with `timeout` per probe.
    #[must_use]
    pub fn new(transport: Arc<dyn CatalogTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Probe all dependencies concurrently.
    pub async fn aggregate_health(&self) -> CompositeHealth {
        let (item, ratings, commentary) = tokio::join!(
            self.probe(Dependency::Item),
            self.probe(Dependency::Ratings),
            self.probe(Dependency::Commentary),
        );

        CompositeHealth {
            item,
            ratings,
            commentary,
        }
    }

    async fn probe(&self, dependency: Dependency) -> ComponentHealth {
        let status = match tokio::time::timeout(self.timeout, self.transport.probe(dependency)).await
        {
            Ok(Ok(())) => Status::Up,
            Ok(Err(e)) => {
                tracing::warn!(%dependency, error = %e, "Health probe failed");
                Status::Down
            }
            Err(_) => {
                tracing::warn!(%dependency, timeout_ms = self.timeout.as_millis(), "Health probe timed out");
                Status::Down
            }
        };

        ComponentHealth { status }
    }
}
