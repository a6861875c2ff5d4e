//! Event channel abstraction for the asynchronous write path.
//!
//! The composite never writes to the dependent services directly. It publishes
//! keyed [`SerializedEvent`] envelopes to one topic per dependent service, and
//! each service consumes its own topic.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  POST/DELETE     │
//! │   /aggregate     │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Publish pool    │◄─── bounded, one worker per key shard
//! └────────┬─────────┘
//!          │
//!     ┌────┼──────────┐
//!     ▼    ▼          ▼
//! ┌──────┐┌───────┐┌────────────┐
//! │items ││ratings││ commentary │
//! └──────┘└───────┘└────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Keyed**: the envelope key is the message key, so all events for one
//!   item share a partition and keep publish order
//! - **At-least-once**: consumers must tolerate duplicates; deletes are
//!   idempotent by contract
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in the testing crate, for tests
//! - `RedpandaEventBus` in the redpanda crate, for production
//!
//! # Example
//!
//! ```rust,ignore
//! use catalog_composite_core::event::Event;
//! use catalog_composite_core::event_bus::EventBus;
//!
//! async fn example(bus: impl EventBus) -> anyhow::Result<()> {
//!     let event = Event::create(item).to_serialized()?;
//!     bus.publish("items", &event).await?;
//!     Ok(())
//! }
//! ```

use crate::event::SerializedEvent;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event channel operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Broker refused or failed to accept an event
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Publishing over keyed topics.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the bus can be shared as
/// `Arc<dyn EventBus>` between the publisher and its pool workers.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// Resolves once the channel has accepted the event; `event.key` is
    /// used as the partition key.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the channel refuses it.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;
}
