//! Event envelopes for the asynchronous write path.
//!
//! Writes to the dependent services are never performed synchronously. Each
//! create or delete intent is wrapped in an [`Event`] envelope, serialized to
//! JSON and published to the topic owned by the target service.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "eventType": "CREATE",
//!   "key": 1,
//!   "data": { "id": 1, "name": "lamp", "weight": 3 },
//!   "eventCreatedAt": "2025-01-01T00:00:00Z"
//! }
//! ```
//!
//! `data` is omitted for `DELETE`. The envelope key doubles as the partition
//! key, so every event concerning one item lands on the same partition and is
//! consumed in publish order.
//!
//! # Example
//!
//! ```
//! use catalog_composite_core::event::{Event, EventType};
//! use catalog_composite_core::model::Item;
//!
//! let event = Event::create(Item::new(1, "lamp", 3));
//! assert_eq!(event.event_type(), EventType::Create);
//! assert_eq!(*event.key(), 1);
//!
//! let wire = event.to_serialized().unwrap();
//! let decoded: Event<i32, Item> = Event::from_serialized(&wire).unwrap();
//! assert!(decoded.is_same_event(&event));
//! ```

use crate::model::{Commentary, Item, ItemId, Rating};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for envelope encoding and decoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize the envelope.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize the envelope.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Envelope decoded but breaks the create/delete payload rules.
    #[error("Malformed event envelope: {0}")]
    InvariantViolation(String),
}

/// Kind of write intent carried by an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Create the record in `data`
    Create,
    /// Delete every record under `key`
    Delete,
}

impl EventType {
    /// Wire name of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload that knows which partition it belongs to.
///
/// For all three record kinds this is the owning item's identifier.
pub trait PartitionKey {
    /// Key type used for partitioning.
    type Key;

    /// The key this record is published under.
    fn partition_key(&self) -> Self::Key;
}

impl PartitionKey for Item {
    type Key = ItemId;

    fn partition_key(&self) -> ItemId {
        self.id
    }
}

impl PartitionKey for Rating {
    type Key = ItemId;

    fn partition_key(&self) -> ItemId {
        self.item_id
    }
}

impl PartitionKey for Commentary {
    type Key = ItemId;

    fn partition_key(&self) -> ItemId {
        self.item_id
    }
}

/// Immutable event envelope, generic over key `K` and payload `T`.
///
/// Construct with [`Event::create`] or [`Event::delete`]; the constructors
/// guarantee that `CREATE` carries a payload whose partition key equals `key`
/// and that `DELETE` carries none.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<K, T> {
    event_type: EventType,
    key: K,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    event_created_at: DateTime<Utc>,
}

impl<K, T> Event<K, T>
where
    T: PartitionKey<Key = K>,
{
    /// Create envelope stamped with the current time.
    #[must_use]
    pub fn create(data: T) -> Self {
        Self::create_at(data, Utc::now())
    }

    /// Create envelope with an explicit timestamp.
    #[must_use]
    pub fn create_at(data: T, created_at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventType::Create,
            key: data.partition_key(),
            data: Some(data),
            event_created_at: created_at,
        }
    }
}

impl<K, T> Event<K, T> {
    /// Delete envelope stamped with the current time.
    #[must_use]
    pub fn delete(key: K) -> Self {
        Self::delete_at(key, Utc::now())
    }

    /// Delete envelope with an explicit timestamp.
    #[must_use]
    pub const fn delete_at(key: K, created_at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventType::Delete,
            key,
            data: None,
            event_created_at: created_at,
        }
    }

    /// Kind of write intent.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Envelope key (also the partition key).
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Payload, present only for `CREATE`.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// When the envelope was constructed.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.event_created_at
    }

    /// Consume the envelope and return its payload.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

impl<K, T> Event<K, T>
where
    K: PartialEq,
    T: PartialEq,
{
    /// Same type, key and payload; the creation timestamp is ignored.
    ///
    /// Two envelopes built from the same intent at different instants are
    /// the same event.
    #[must_use]
    pub fn is_same_event(&self, other: &Self) -> bool {
        self.event_type == other.event_type && self.key == other.key && self.data == other.data
    }
}

impl<K, T> Event<K, T>
where
    K: Serialize + fmt::Display,
    T: Serialize,
{
    /// Encode into the JSON wire format, keyed for partitioning.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be
    /// represented as JSON.
    pub fn to_serialized(&self) -> Result<SerializedEvent, EventError> {
        let data = serde_json::to_vec(self)
            .map_err(|e| EventError::SerializationError(e.to_string()))?;

        Ok(SerializedEvent {
            key: self.key.to_string(),
            event_type: self.event_type.as_str().to_string(),
            data,
        })
    }
}

impl<K, T> Event<K, T>
where
    K: DeserializeOwned + PartialEq + fmt::Debug,
    T: DeserializeOwned + PartitionKey<Key = K>,
{
    /// Decode from the JSON wire format and check the payload rules.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] for invalid JSON and
    /// [`EventError::InvariantViolation`] when a `CREATE` lacks a payload or
    /// its payload belongs to another key, or a `DELETE` carries a payload.
    pub fn from_serialized(event: &SerializedEvent) -> Result<Self, EventError> {
        Self::decode(&event.data)
    }

    /// Decode raw JSON bytes. See [`Event::from_serialized`].
    ///
    /// # Errors
    ///
    /// Same as [`Event::from_serialized`].
    pub fn decode(bytes: &[u8]) -> Result<Self, EventError> {
        let event: Self = serde_json::from_slice(bytes)
            .map_err(|e| EventError::DeserializationError(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    fn validate(&self) -> Result<(), EventError> {
        match (self.event_type, &self.data) {
            (EventType::Create, None) => Err(EventError::InvariantViolation(
                "CREATE event without data".to_string(),
            )),
            (EventType::Create, Some(data)) => {
                let payload_key = data.partition_key();
                if payload_key == self.key {
                    Ok(())
                } else {
                    Err(EventError::InvariantViolation(format!(
                        "CREATE payload belongs to key {payload_key:?}, envelope key is {:?}",
                        self.key
                    )))
                }
            }
            (EventType::Delete, Some(_)) => Err(EventError::InvariantViolation(
                "DELETE event with data".to_string(),
            )),
            (EventType::Delete, None) => Ok(()),
        }
    }
}

/// An encoded envelope ready for the event channel.
///
/// `key` is the partition key; `data` holds the JSON envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedEvent {
    /// Partition key
    pub key: String,
    /// Wire name of the event type (`CREATE` or `DELETE`)
    pub event_type: String,
    /// JSON encoded envelope
    pub data: Vec<u8>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(key: String, event_type: String, data: Vec<u8>) -> Self {
        Self {
            key,
            event_type,
            data,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn create_json_matches_wire_format() {
        let event = Event::create_at(Item::new(1, "name", 1), at(1_735_689_600));
        let json: serde_json::Value =
            serde_json::from_slice(&event.to_serialized().unwrap().data).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "eventType": "CREATE",
                "key": 1,
                "data": { "id": 1, "name": "name", "weight": 1 },
                "eventCreatedAt": "2025-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn delete_omits_data() {
        let event: Event<ItemId, Rating> = Event::delete_at(5, at(0));
        let wire = event.to_serialized().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&wire.data).unwrap();

        assert_eq!(wire.key, "5");
        assert_eq!(wire.event_type, "DELETE");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn same_event_ignores_created_at() {
        let first = Event::create_at(Item::new(1, "name", 1), at(10));
        let second = Event::create_at(Item::new(1, "name", 1), at(20));
        let delete: Event<ItemId, Item> = Event::delete_at(1, at(10));
        let other = Event::create_at(Item::new(2, "name", 1), at(10));

        assert!(first.is_same_event(&second));
        assert!(!first.is_same_event(&delete));
        assert!(!first.is_same_event(&other));
    }

    #[test]
    fn decode_rejects_create_without_data() {
        let bytes = br#"{"eventType":"CREATE","key":1,"eventCreatedAt":"2025-01-01T00:00:00Z"}"#;
        let result = Event::<ItemId, Item>::decode(bytes);
        assert!(matches!(result, Err(EventError::InvariantViolation(_))));
    }

    #[test]
    fn decode_rejects_mismatched_key() {
        let bytes = br#"{"eventType":"CREATE","key":2,"data":{"id":1,"name":"n","weight":1},"eventCreatedAt":"2025-01-01T00:00:00Z"}"#;
        let result = Event::<ItemId, Item>::decode(bytes);
        assert!(matches!(result, Err(EventError::InvariantViolation(_))));
    }

    #[test]
    fn decode_rejects_delete_with_data() {
        let bytes = br#"{"eventType":"DELETE","key":1,"data":{"id":1,"name":"n","weight":1},"eventCreatedAt":"2025-01-01T00:00:00Z"}"#;
        let result = Event::<ItemId, Item>::decode(bytes);
        assert!(matches!(result, Err(EventError::InvariantViolation(_))));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = Event::<ItemId, Item>::decode(b"not json");
        assert!(matches!(result, Err(EventError::DeserializationError(_))));
    }

    proptest! {
        #[test]
        fn rating_payload_survives_the_wire(
            item_id in 1..i32::MAX,
            rating_id in any::<i32>(),
            rate in 0..=5i32,
            author in "[a-zA-Z ]{0,16}",
            content in "\\PC{0,32}",
        ) {
            let rating = Rating {
                item_id,
                rating_id,
                author,
                rate,
                content,
                origin_address: None,
            };
            let event = Event::create(rating.clone());
            let decoded: Event<ItemId, Rating> =
                Event::from_serialized(&event.to_serialized().unwrap()).unwrap();

            prop_assert_eq!(decoded.data(), Some(&rating));
            prop_assert_eq!(*decoded.key(), item_id);
            prop_assert_eq!(decoded.created_at(), event.created_at());
        }
    }
}
