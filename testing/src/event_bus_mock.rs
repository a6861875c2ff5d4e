//! In-memory event channel for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use catalog_composite_core::event::SerializedEvent;
use catalog_composite_core::event_bus::{EventBus, EventBusError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory event bus for fast, deterministic testing.
///
/// Keeps every published event per topic in publish order. Publishing can be
/// switched to fail for error-path tests.
///
/// # Example
///
/// ```
/// use catalog_composite_testing::InMemoryEventBus;
/// use catalog_composite_core::event::SerializedEvent;
/// use catalog_composite_core::event_bus::EventBus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryEventBus::new();
/// let event = SerializedEvent::new("1".into(), "DELETE".into(), b"{}".to_vec());
///
/// bus.publish("items", &event).await?;
/// assert_eq!(bus.published("items"), vec![event]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryEventBus {
    topics: Arc<RwLock<HashMap<String, Vec<SerializedEvent>>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    /// Create a new empty bus
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent publish fail (or succeed again)
    pub fn fail_publishes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events published to `topic`, in publish order
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<SerializedEvent> {
        self.topics
            .read()
            .unwrap()
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of events across all topics
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.topics.read().unwrap().values().map(Vec::len).sum()
    }

    /// Forget everything published so far
    pub fn clear(&self) {
        self.topics.write().unwrap().clear();
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "publishing disabled by test".to_string(),
                });
            }

            self.topics
                .write()
                .unwrap()
                .entry(topic)
                .or_default()
                .push(event);
            Ok(())
        })
    }
}
