//! Bounded worker pool handing events to the event channel.
//!
//! The pool owns `workers` tasks, each draining its own bounded queue. A
//! submission is routed to a worker by hashing its partition key, so events
//! sharing a key are published one after another in submission order while
//! different keys proceed in parallel.
//!
//! Submitting never waits for queue space: a full queue fails immediately
//! with [`SubmissionError::QueueFull`]. The returned [`PublishReceipt`]
//! resolves once the channel has accepted (or refused) the event.
//!
//! ```text
//!  submit(key=7) ─┐      ┌──────────┐
//!  submit(key=3) ─┼─hash─► worker 0 ├──► EventBus::publish
//!  submit(key=7) ─┘      ├──────────┤
//!                        │ worker 1 ├──► EventBus::publish
//!                        └──────────┘
//! ```

use crate::metrics::PublishMetrics;
use catalog_composite_core::event::SerializedEvent;
use catalog_composite_core::event_bus::{EventBus, EventBusError};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPoolConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Total queued events across all workers
    pub queue_capacity: usize,
}

impl Default for PublishPoolConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_capacity: 100,
        }
    }
}

impl PublishPoolConfig {
    /// Queue capacity of a single worker, at least 1.
    #[must_use]
    pub const fn per_worker_capacity(&self) -> usize {
        let workers = if self.workers == 0 { 1 } else { self.workers };
        let capacity = self.queue_capacity.div_ceil(workers);
        if capacity == 0 { 1 } else { capacity }
    }
}

/// Why an event could not be published.
#[derive(Error, Debug, Clone)]
pub enum SubmissionError {
    /// Worker queue for this key is full
    #[error("Publish queue full for topic '{topic}'")]
    QueueFull {
        /// Target topic
        topic: String,
    },
    /// Pool has shut down
    #[error("Publish pool is shut down")]
    Closed,
    /// Event channel refused the event
    #[error(transparent)]
    Rejected(#[from] EventBusError),
}

struct PublishJob {
    topic: String,
    event: SerializedEvent,
    ack: oneshot::Sender<Result<(), EventBusError>>,
}

/// Pending acknowledgement for a submitted event.
#[derive(Debug)]
pub struct PublishReceipt {
    rx: oneshot::Receiver<Result<(), EventBusError>>,
}

impl PublishReceipt {
    /// Wait until the channel has accepted the event.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Rejected`] if the channel refused it and
    /// [`SubmissionError::Closed`] if the worker went away first.
    pub async fn acknowledged(self) -> Result<(), SubmissionError> {
        match self.rx.await {
            Ok(result) => result.map_err(SubmissionError::from),
            Err(_) => Err(SubmissionError::Closed),
        }
    }
}

/// Fixed set of publish workers sharded by partition key.
pub struct PublishPool {
    senders: Vec<mpsc::Sender<PublishJob>>,
    handles: Vec<JoinHandle<()>>,
}

impl PublishPool {
    /// Spawn the workers on the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, config: PublishPoolConfig) -> Self {
        let workers = config.workers.max(1);
        let capacity = config.per_worker_capacity();

        let (senders, handles) = (0..workers)
            .map(|worker| {
                let (tx, rx) = mpsc::channel(capacity);
                let handle = tokio::spawn(run_worker(worker, Arc::clone(&bus), rx));
                (tx, handle)
            })
            .unzip();

        tracing::info!(workers, per_worker_capacity = capacity, "Publish pool started");

        Self { senders, handles }
    }

    /// Number of workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Queue an event on the worker owning its key.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::QueueFull`] when that worker's queue has
    /// no room and [`SubmissionError::Closed`] if the worker stopped.
    pub fn submit(
        &self,
        topic: &str,
        event: SerializedEvent,
    ) -> Result<PublishReceipt, SubmissionError> {
        let worker = self.shard(&event.key);
        let (ack, rx) = oneshot::channel();
        let job = PublishJob {
            topic: topic.to_string(),
            event,
            ack,
        };

        match self.senders[worker].try_send(job) {
            Ok(()) => {
                PublishMetrics::record_submitted(topic);
                Ok(PublishReceipt { rx })
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                PublishMetrics::record_rejected(topic);
                tracing::warn!(topic, key = %job.event.key, worker, "Publish queue full, rejecting event");
                Err(SubmissionError::QueueFull {
                    topic: topic.to_string(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SubmissionError::Closed),
        }
    }

    /// Stop accepting events and wait for queued ones to be published.
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Publish worker terminated abnormally");
            }
        }
        tracing::info!("Publish pool stopped");
    }

    fn shard(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let workers = self.senders.len() as u64;
        usize::try_from(hasher.finish() % workers).unwrap_or(0)
    }
}

async fn run_worker(worker: usize, bus: Arc<dyn EventBus>, mut rx: mpsc::Receiver<PublishJob>) {
    while let Some(job) = rx.recv().await {
        let start = Instant::now();
        let result = bus.publish(&job.topic, &job.event).await;

        match &result {
            Ok(()) => {
                PublishMetrics::record_published(&job.topic, start.elapsed());
                tracing::debug!(
                    worker,
                    topic = %job.topic,
                    key = %job.event.key,
                    event_type = %job.event.event_type,
                    "Event published"
                );
            }
            Err(e) => {
                PublishMetrics::record_failed(&job.topic);
                tracing::error!(
                    worker,
                    topic = %job.topic,
                    key = %job.event.key,
                    error = %e,
                    "Event channel refused event"
                );
            }
        }

        // Submitter may have stopped waiting
        let _ = job.ack.send(result);
    }
    tracing::debug!(worker, "Publish worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use catalog_composite_testing::mocks::InMemoryEventBus;
    use std::future::Future;
    use std::pin::Pin;
    use tokio::sync::Semaphore;

    fn event(key: &str, n: u8) -> SerializedEvent {
        SerializedEvent::new(key.to_string(), "CREATE".to_string(), vec![n])
    }

    /// Holds every publish until a permit is released.
    struct GatedBus {
        gate: Arc<Semaphore>,
    }

    impl EventBus for GatedBus {
        fn publish(
            &self,
            _topic: &str,
            _event: &SerializedEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
            Box::pin(async move {
                let permit = self.gate.acquire().await.map_err(|e| {
                    EventBusError::TransportError(e.to_string())
                })?;
                permit.forget();
                Ok(())
            })
        }
    }

    #[test]
    fn test_per_worker_capacity() {
        let config = PublishPoolConfig::default();
        assert_eq!(config.per_worker_capacity(), 10);
        let uneven = PublishPoolConfig {
            workers: 3,
            queue_capacity: 10,
        };
        assert_eq!(uneven.per_worker_capacity(), 4);
        let tiny = PublishPoolConfig {
            workers: 4,
            queue_capacity: 0,
        };
        assert_eq!(tiny.per_worker_capacity(), 1);
    }

    #[tokio::test]
    async fn test_acknowledges_after_channel_accepts() {
        let bus = Arc::new(InMemoryEventBus::new());
        let pool = PublishPool::new(bus.clone(), PublishPoolConfig::default());

        let receipt = pool.submit("items", event("1", 0)).unwrap();
        receipt.acknowledged().await.unwrap();

        assert_eq!(bus.published("items").len(), 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_same_key_keeps_submission_order() {
        let bus = Arc::new(InMemoryEventBus::new());
        let pool = PublishPool::new(
            bus.clone(),
            PublishPoolConfig {
                workers: 4,
                queue_capacity: 400,
            },
        );

        let mut receipts = Vec::new();
        for n in 0..50u8 {
            receipts.push(pool.submit("items", event("7", n)).unwrap());
            receipts.push(pool.submit("items", event("8", n)).unwrap());
        }
        for receipt in receipts {
            receipt.acknowledged().await.unwrap();
        }

        let for_key = |key: &str| -> Vec<u8> {
            bus.published("items")
                .into_iter()
                .filter(|e| e.key == key)
                .map(|e| e.data[0])
                .collect()
        };
        assert_eq!(for_key("7"), (0..50).collect::<Vec<_>>());
        assert_eq!(for_key("8"), (0..50).collect::<Vec<_>>());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_fails_fast() {
        let gate = Arc::new(Semaphore::new(0));
        let pool = PublishPool::new(
            Arc::new(GatedBus {
                gate: Arc::clone(&gate),
            }),
            PublishPoolConfig {
                workers: 1,
                queue_capacity: 1,
            },
        );

        // One in flight inside the worker, one queued
        let first = pool.submit("items", event("1", 0)).unwrap();
        while pool.senders[0].capacity() == 0 {
            tokio::task::yield_now().await;
        }
        let second = pool.submit("items", event("1", 1)).unwrap();
        let third = pool.submit("items", event("1", 2));

        assert!(matches!(third, Err(SubmissionError::QueueFull { .. })));

        gate.add_permits(2);
        first.acknowledged().await.unwrap();
        second.acknowledged().await.unwrap();
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_channel_refusal_reaches_submitter() {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.fail_publishes(true);
        let pool = PublishPool::new(bus.clone(), PublishPoolConfig::default());

        let result = pool
            .submit("ratings", event("3", 0))
            .unwrap()
            .acknowledged()
            .await;

        assert!(matches!(result, Err(SubmissionError::Rejected(_))));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let bus = Arc::new(InMemoryEventBus::new());
        let pool = PublishPool::new(bus.clone(), PublishPoolConfig::default());

        for n in 0..20u8 {
            let _receipt = pool.submit("commentary", event(&n.to_string(), n)).unwrap();
        }
        pool.shutdown().await;

        assert_eq!(bus.published("commentary").len(), 20);
    }
}
