//! Event publisher for the write path.
//!
//! Wraps create and delete intents into [`Event`] envelopes stamped by the
//! publisher's clock and hands them to the [`PublishPool`]. Submission is
//! synchronous and never waits for queue space; the returned
//! [`PendingPublish`] resolves once the channel accepted the event.

use catalog_composite_core::catalog::Dependency;
use catalog_composite_core::environment::Clock;
use catalog_composite_core::error::CompositeError;
use catalog_composite_core::event::{Event, PartitionKey, SerializedEvent};
use catalog_composite_core::model::ItemId;
use catalog_composite_runtime::{PublishPool, PublishReceipt, SubmissionError};
use serde::Serialize;
use std::sync::Arc;

/// Topic consumed by each dependent service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Item service topic
    pub items: String,
    /// Ratings service topic
    pub ratings: String,
    /// Commentary service topic
    pub commentary: String,
}

impl Topics {
    /// Topic consumed by `dependency`.
    #[must_use]
    pub fn for_dependency(&self, dependency: Dependency) -> &str {
        match dependency {
            Dependency::Item => &self.items,
            Dependency::Ratings => &self.ratings,
            Dependency::Commentary => &self.commentary,
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            items: "items".to_string(),
            ratings: "ratings".to_string(),
            commentary: "commentary".to_string(),
        }
    }
}

/// An event queued on the pool, awaiting the channel's acknowledgement.
#[derive(Debug)]
#[must_use = "the event is only known to be published once accepted() resolves"]
pub struct PendingPublish {
    topic: String,
    key: String,
    receipt: PublishReceipt,
}

impl PendingPublish {
    /// Wait until the channel has accepted the event.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] if the channel refused it.
    pub async fn accepted(self) -> Result<(), CompositeError> {
        self.receipt.acknowledged().await.map_err(|e| {
            tracing::warn!(topic = %self.topic, key = %self.key, error = %e, "Event was not published");
            submission_error(&e)
        })
    }
}

/// Turns write intents into published envelopes.
#[derive(Clone)]
pub struct EventPublisher {
    pool: Arc<PublishPool>,
    topics: Topics,
    clock: Arc<dyn Clock>,
}

impl EventPublisher {
    /// Create a publisher over a running pool.
    #[must_use]
    pub fn new(pool: Arc<PublishPool>, topics: Topics, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            topics,
            clock,
        }
    }

    /// Configured topics.
    #[must_use]
    pub const fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Queue a `CREATE` envelope for `payload` on the topic of `dependency`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] when the payload cannot be
    /// encoded or the worker queue is full.
    pub fn submit_create<T>(
        &self,
        dependency: Dependency,
        payload: T,
    ) -> Result<PendingPublish, CompositeError>
    where
        T: Serialize + PartitionKey<Key = ItemId>,
    {
        let event = Event::create_at(payload, self.clock.now());
        self.submit(dependency, encode(&event)?)
    }

    /// Queue a `DELETE` envelope for `key` on the topic of `dependency`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::EventSubmission`] when the worker queue is
    /// full.
    pub fn submit_delete<T>(
        &self,
        dependency: Dependency,
        key: ItemId,
    ) -> Result<PendingPublish, CompositeError>
    where
        T: Serialize,
    {
        let event = Event::<ItemId, T>::delete_at(key, self.clock.now());
        self.submit(dependency, encode(&event)?)
    }

    fn submit(
        &self,
        dependency: Dependency,
        event: SerializedEvent,
    ) -> Result<PendingPublish, CompositeError> {
        let topic = self.topics.for_dependency(dependency);
        let key = event.key.clone();
        tracing::debug!(topic, key = %key, event_type = %event.event_type, "Submitting event");

        let receipt = self
            .pool
            .submit(topic, event)
            .map_err(|e| submission_error(&e))?;

        Ok(PendingPublish {
            topic: topic.to_string(),
            key,
            receipt,
        })
    }

    /// Stop the pool once this is the last handle to it.
    ///
    /// Waits for queued events to be published.
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.pool) {
            Ok(pool) => pool.shutdown().await,
            Err(_) => tracing::warn!("Publish pool still shared, skipping drain"),
        }
    }
}

fn encode<T: Serialize>(event: &Event<ItemId, T>) -> Result<SerializedEvent, CompositeError> {
    event
        .to_serialized()
        .map_err(|e| CompositeError::EventSubmission(format!("Could not encode event: {e}")))
}

fn submission_error(err: &SubmissionError) -> CompositeError {
    CompositeError::EventSubmission(err.to_string())
}
