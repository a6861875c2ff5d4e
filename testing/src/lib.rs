//! # Catalog Composite Testing
//!
//! Testing utilities for the catalog composite.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic time for envelope timestamps
//! - [`InMemoryEventBus`]: records every published event per topic
//! - [`MockCatalog`]: scripted stand-in for the three dependent services
//!
//! ## Example
//!
//! ```ignore
//! use catalog_composite_testing::{InMemoryEventBus, MockCatalog, test_clock};
//!
//! #[tokio::test]
//! async fn delete_publishes_three_events() {
//!     let bus = Arc::new(InMemoryEventBus::new());
//!     let aggregator = build_aggregator(Arc::new(MockCatalog::new()), bus.clone(), test_clock());
//!
//!     aggregator.delete_aggregate(1).await.unwrap();
//!
//!     assert_eq!(bus.published_count(), 3);
//! }
//! ```

use chrono::{DateTime, Utc};
use catalog_composite_core::environment::Clock;

mod catalog_mock;
mod event_bus_mock;

/// Mock implementations of the environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    pub use crate::catalog_mock::MockCatalog;
    pub use crate::event_bus_mock::InMemoryEventBus;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_composite_testing::mocks::FixedClock;
    /// use catalog_composite_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, InMemoryEventBus, MockCatalog, test_clock};
