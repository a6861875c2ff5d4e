//! Redpanda event channel for the catalog composite.
//!
//! Implements the [`EventBus`] trait from `catalog-composite-core` on top of
//! rdkafka, so any Kafka-compatible broker works (Redpanda, Apache Kafka, MSK).
//!
//! # Message layout
//!
//! | Kafka field | Content |
//! |---|---|
//! | key | envelope key (the item id), drives partitioning |
//! | payload | JSON envelope (`eventType`, `key`, `data`, `eventCreatedAt`) |
//! | header `eventType` | `CREATE` or `DELETE` |
//!
//! All events concerning one item share a key, hence a partition, hence an
//! order. The producer runs idempotent with `acks=all` so broker retries do
//! not reorder a partition.
//!
//! # Delivery Semantics
//!
//! A publish resolves once the broker acknowledged the record. The dependent
//! services consume their own topics with at-least-once delivery; this crate
//! only produces.
//!
//! # Example
//!
//! ```no_run
//! use catalog_composite_redpanda::RedpandaEventBus;
//! use catalog_composite_core::event::Event;
//! use catalog_composite_core::event_bus::EventBus;
//! use catalog_composite_core::model::Item;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::new("localhost:9092")?;
//!
//! let event = Event::create(Item::new(1, "lamp", 3)).to_serialized()?;
//! event_bus.publish("items", &event).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use catalog_composite_core::event::SerializedEvent;
use catalog_composite_core::event_bus::{EventBus, EventBusError};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Header carrying the event type.
pub const EVENT_TYPE_HEADER: &str = "eventType";

/// Redpanda event bus implementation.
///
/// # Configuration
///
/// - **Broker addresses**: Bootstrap servers (required)
/// - **Producer settings**: Acks, compression, timeout
///
/// # Example
///
/// ```no_run
/// use catalog_composite_redpanda::RedpandaEventBus;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .compression("lz4")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    /// Kafka producer for publishing events
    producer: FutureProducer,
    /// Broker addresses
    brokers: String,
    /// Producer send timeout
    timeout: Duration,
}

impl RedpandaEventBus {
    /// Create a new Redpanda event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be
    /// created from the given broker list.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for configuring a [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
}

impl RedpandaEventBusBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: "0", "1" or "all".
    ///
    /// Default: "all". Anything but "all" disables producer idempotence.
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set or
    /// the producer configuration is rejected.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self.brokers.ok_or_else(|| {
            EventBusError::ConnectionFailed("Brokers not configured".to_string())
        })?;
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let idempotent = if acks == "all" { "true" } else { "false" };
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("enable.idempotence", idempotent)
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            );

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            acks,
            idempotent,
            compression = self.compression.as_deref().unwrap_or("none"),
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout,
        })
    }
}

/// Headers attached to every published record.
fn record_headers(event: &SerializedEvent) -> OwnedHeaders {
    OwnedHeaders::new().insert(Header {
        key: EVENT_TYPE_HEADER,
        value: Some(event.event_type.as_str()),
    })
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let record = FutureRecord::to(&topic)
                .payload(&event.data)
                .key(event.key.as_bytes())
                .headers(record_headers(&event));

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        key = %event.key,
                        partition,
                        offset,
                        event_type = %event.event_type,
                        "Event accepted by broker"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        key = %event.key,
                        error = %kafka_error,
                        "Failed to publish event"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use catalog_composite_core::event::Event;
    use catalog_composite_core::model::Rating;
    use rdkafka::message::Headers;

    fn rating() -> Rating {
        Rating {
            item_id: 4,
            rating_id: 1,
            author: "a".to_string(),
            rate: 5,
            content: "c".to_string(),
            origin_address: None,
        }
    }

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn record_headers_carry_event_type() {
        let event = Event::create(rating()).to_serialized().unwrap();

        let headers = record_headers(&event);

        assert_eq!(headers.count(), 1);
        let header = headers.get(0);
        assert_eq!(header.key, EVENT_TYPE_HEADER);
        assert_eq!(header.value, Some(b"CREATE".as_slice()));
    }

    #[test]
    fn delete_records_are_tagged_delete() {
        let event: Event<i32, Rating> = Event::delete(4);
        let event = event.to_serialized().unwrap();

        let headers = record_headers(&event);

        assert_eq!(headers.get(0).value, Some(b"DELETE".as_slice()));
        assert_eq!(event.key, "4");
    }

    #[test]
    fn builder_keeps_brokers() {
        let bus = RedpandaEventBus::builder()
            .brokers("localhost:9092")
            .producer_acks("all")
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();

        assert_eq!(bus.brokers(), "localhost:9092");
    }
}
