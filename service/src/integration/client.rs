//! Downstream client: resilient reads and event-driven writes.
//!
//! Item reads go through the [`ResiliencePolicy`] and fall back to a
//! placeholder item when the breaker is open or retries run out. Ratings and
//! commentary reads are best effort and degrade to empty lists. Writes are
//! never sent to the services directly; they are published as events.

use crate::publisher::{EventPublisher, PendingPublish};
use catalog_composite_core::catalog::{CatalogTransport, Dependency, ReadOptions};
use catalog_composite_core::error::CompositeError;
use catalog_composite_core::model::{Commentary, Item, ItemId, Rating};
use catalog_composite_runtime::metrics::DownstreamMetrics;
use catalog_composite_runtime::{ResilienceError, ResiliencePolicy};
use std::sync::Arc;

/// Item id that never exists, not even as a fallback.
pub const SENTINEL_ITEM_ID: ItemId = 13;

/// Access to the three dependent services.
#[derive(Clone)]
pub struct DownstreamClient {
    transport: Arc<dyn CatalogTransport>,
    policy: ResiliencePolicy,
    publisher: EventPublisher,
    composite_address: String,
}

impl DownstreamClient {
    /// Create a client.
    ///
    /// `composite_address` is reported as the origin of fallback items.
    #[must_use]
    pub fn new(
        transport: Arc<dyn CatalogTransport>,
        policy: ResiliencePolicy,
        publisher: EventPublisher,
        composite_address: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            policy,
            publisher,
            composite_address: composite_address.into(),
        }
    }

    /// Address of this composite instance.
    #[must_use]
    pub fn composite_address(&self) -> &str {
        &self.composite_address
    }

    /// Policy guarding item reads.
    #[must_use]
    pub const fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// Read an item under the resilience policy.
    ///
    /// # Errors
    ///
    /// - [`CompositeError::NotFound`] for unknown ids, and for
    ///   [`SENTINEL_ITEM_ID`] even when the fallback answers
    /// - [`CompositeError::InvalidInput`] when the item service rejects the id
    /// - [`CompositeError::Upstream`] for unexpected statuses
    pub async fn fetch_primary(
        &self,
        id: ItemId,
        options: &ReadOptions,
    ) -> Result<Item, CompositeError> {
        let transport = &self.transport;
        match self
            .policy
            .execute(|| transport.fetch_item(id, options))
            .await
        {
            Ok(item) => Ok(item),
            Err(e) if e.should_fallback() => self.fallback_item(id, &e),
            Err(e) => Err(e.into_error()),
        }
    }

    fn fallback_item(
        &self,
        id: ItemId,
        cause: &ResilienceError<CompositeError>,
    ) -> Result<Item, CompositeError> {
        tracing::warn!(item_id = id, cause = %cause, "Creating a fallback item");

        if id == SENTINEL_ITEM_ID {
            return Err(CompositeError::NotFound(format!(
                "Item Id: {id} not found in fallback cache!"
            )));
        }

        DownstreamMetrics::record_fallback(Dependency::Item.as_str());
        Ok(Item {
            id,
            name: format!("Fallback item{id}"),
            weight: id,
            origin_address: Some(self.composite_address.clone()),
        })
    }

    /// Read ratings; any failure yields an empty list.
    pub async fn fetch_ratings(&self, id: ItemId, options: &ReadOptions) -> Vec<Rating> {
        self.transport
            .fetch_ratings(id, options)
            .await
            .unwrap_or_else(|e| degraded(Dependency::Ratings, id, &e))
    }

    /// Read commentary; any failure yields an empty list.
    pub async fn fetch_commentary(&self, id: ItemId, options: &ReadOptions) -> Vec<Commentary> {
        self.transport
            .fetch_commentary(id, options)
            .await
            .unwrap_or_else(|e| degraded(Dependency::Commentary, id, &e))
    }

    /// Queue creation of an item.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] if the event cannot be queued.
    pub fn create_item(&self, item: Item) -> Result<PendingPublish, CompositeError> {
        self.publisher.submit_create(Dependency::Item, item)
    }

    /// Queue creation of a rating.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] if the event cannot be queued.
    pub fn create_rating(&self, rating: Rating) -> Result<PendingPublish, CompositeError> {
        self.publisher.submit_create(Dependency::Ratings, rating)
    }

    /// Queue creation of a commentary record.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] if the event cannot be queued.
    pub fn create_commentary(
        &self,
        commentary: Commentary,
    ) -> Result<PendingPublish, CompositeError> {
        self.publisher.submit_create(Dependency::Commentary, commentary)
    }

    /// Queue deletion of an item.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] if the event cannot be queued.
    pub fn delete_item(&self, id: ItemId) -> Result<PendingPublish, CompositeError> {
        self.publisher.submit_delete::<Item>(Dependency::Item, id)
    }

    /// Queue deletion of every rating of an item.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] if the event cannot be queued.
    pub fn delete_ratings(&self, id: ItemId) -> Result<PendingPublish, CompositeError> {
        self.publisher.submit_delete::<Rating>(Dependency::Ratings, id)
    }

    /// Queue deletion of every commentary record of an item.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] if the event cannot be queued.
    pub fn delete_commentary(&self, id: ItemId) -> Result<PendingPublish, CompositeError> {
        self.publisher
            .submit_delete::<Commentary>(Dependency::Commentary, id)
    }
}

fn degraded<T>(dependency: Dependency, id: ItemId, err: &CompositeError) -> Vec<T> {
    tracing::warn!(
        %dependency,
        item_id = id,
        error = %err,
        "Got an error while requesting {dependency}, returning an empty list"
    );
    DownstreamMetrics::record_degraded_read(dependency.as_str());
    Vec::new()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::publisher::Topics;
    use catalog_composite_runtime::circuit_breaker::State;
    use catalog_composite_runtime::{
        CircuitBreaker, CircuitBreakerConfig, PublishPool, PublishPoolConfig, RetryPolicy,
    };
    use catalog_composite_testing::{InMemoryEventBus, MockCatalog, test_clock};
    use std::time::Duration;

    fn client(catalog: &MockCatalog) -> DownstreamClient {
        let breaker = CircuitBreaker::new(
            "item",
            CircuitBreakerConfig::builder()
                .sliding_window_size(2)
                .minimum_number_of_calls(2)
                .build(),
        );
        let retry = RetryPolicy::builder()
            .max_attempts(2)
            .wait_duration(Duration::from_millis(10))
            .build();
        let pool = PublishPool::new(
            Arc::new(InMemoryEventBus::new()),
            PublishPoolConfig::default(),
        );
        let publisher =
            EventPublisher::new(Arc::new(pool), Topics::default(), Arc::new(test_clock()));

        DownstreamClient::new(
            Arc::new(catalog.clone()),
            ResiliencePolicy::new(breaker, retry, Duration::from_millis(500)),
            publisher,
            "composite:7000",
        )
    }

    fn transport_error() -> CompositeError {
        CompositeError::Transport("connection refused".to_string())
    }

    #[tokio::test]
    async fn test_healthy_primary_echoes_id() {
        let catalog = MockCatalog::new();
        let client = client(&catalog);

        let item = client.fetch_primary(5, &ReadOptions::default()).await.unwrap();

        assert_eq!(item, MockCatalog::default_item(5));
        assert_eq!(catalog.item_calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let catalog = MockCatalog::new();
        catalog.queue_item(Err(transport_error()));
        let client = client(&catalog);

        let item = client.fetch_primary(5, &ReadOptions::default()).await.unwrap();

        assert_eq!(item.id, 5);
        assert_eq!(catalog.item_calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back() {
        let catalog = MockCatalog::new();
        catalog.respond_item(Err(transport_error()));
        let client = client(&catalog);

        let item = client.fetch_primary(7, &ReadOptions::default()).await.unwrap();

        assert_eq!(item.name, "Fallback item7");
        assert_eq!(item.weight, 7);
        assert_eq!(item.origin_address.as_deref(), Some("composite:7000"));
    }

    #[tokio::test]
    async fn test_open_circuit_falls_back_without_calling() {
        let catalog = MockCatalog::new();
        let client = client(&catalog);
        client.policy().breaker().trip();

        let item = client.fetch_primary(7, &ReadOptions::default()).await.unwrap();

        assert_eq!(item.name, "Fallback item7");
        assert_eq!(catalog.item_calls(), 0);
    }

    #[tokio::test]
    async fn test_open_circuit_with_sentinel_is_not_found() {
        let catalog = MockCatalog::new();
        let client = client(&catalog);
        client.policy().breaker().trip();

        let result = client
            .fetch_primary(SENTINEL_ITEM_ID, &ReadOptions::default())
            .await;

        assert!(matches!(result, Err(CompositeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried_and_keeps_circuit_closed() {
        let catalog = MockCatalog::new();
        catalog.respond_item(Err(CompositeError::NotFound("No item found".to_string())));
        let client = client(&catalog);

        for _ in 0..3 {
            let result = client.fetch_primary(5, &ReadOptions::default()).await;
            assert!(matches!(result, Err(CompositeError::NotFound(_))));
        }

        assert_eq!(catalog.item_calls(), 3);
        assert_eq!(client.policy().breaker().state(), State::Closed);
    }

    #[tokio::test]
    async fn test_upstream_error_surfaces_without_fallback() {
        let catalog = MockCatalog::new();
        catalog.respond_item(Err(CompositeError::Upstream {
            status: 500,
            message: "boom".to_string(),
        }));
        let client = client(&catalog);

        let result = client.fetch_primary(5, &ReadOptions::default()).await;

        assert!(matches!(result, Err(CompositeError::Upstream { status: 500, .. })));
        assert_eq!(catalog.item_calls(), 1);
    }

    #[tokio::test]
    async fn test_secondary_failures_degrade_to_empty() {
        let catalog = MockCatalog::new();
        catalog.respond_ratings(Err(transport_error()));
        catalog.respond_commentary(Err(CompositeError::Upstream {
            status: 503,
            message: "down".to_string(),
        }));
        let client = client(&catalog);

        assert!(client.fetch_ratings(1, &ReadOptions::default()).await.is_empty());
        assert!(client
            .fetch_commentary(1, &ReadOptions::default())
            .await
            .is_empty());
    }
}
