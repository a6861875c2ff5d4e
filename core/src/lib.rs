//! # Catalog Composite Core
//!
//! Shared vocabulary of the catalog composite: the records exchanged with the
//! item, ratings and commentary services, the event envelope used to write to
//! them, and the traits behind which the wire lives.
//!
//! ## Modules
//!
//! - [`model`]: items, ratings, commentary and the aggregate view
//! - [`event`]: generic `Event<K, T>` envelope and its JSON wire form
//! - [`event_bus`]: publishing seam for the event channel
//! - [`catalog`]: read seam for the dependent services
//! - [`error`]: `CompositeError` with retry and breaker classification
//! - [`environment`]: injected clock
//!
//! ## Example
//!
//! ```
//! use catalog_composite_core::model::{AggregateView, Item};
//!
//! let mut item = Item::new(1, "lamp", 3);
//! item.origin_address = Some("item-0:7001".to_string());
//!
//! let view = AggregateView::assemble(item, &[], &[], "composite:7000");
//! assert_eq!(view.service_addresses.item, "item-0:7001");
//! assert!(view.ratings.is_empty());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod model;

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time for testability
    ///
    /// The publisher stamps `eventCreatedAt` from this clock.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock used in production.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

}
