//! # Catalog Composite
//!
//! Composes the item, ratings and commentary services into one aggregate
//! view, and propagates aggregate writes to them as events.
//!
//! ## Read path
//!
//! ```text
//! GET /aggregate/7 ──► Aggregator ─┬─► item       (breaker ► retry ► timeout, fallback)
//!                                  ├─► ratings    (best effort)
//!                                  └─► commentary (best effort)
//! ```
//!
//! ## Write path
//!
//! ```text
//! POST/DELETE /aggregate ──► Aggregator ──► EventPublisher ──► PublishPool ──► items / ratings / commentary
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let config = Config::from_env();
//! let app = CompositeApp::new(&config, transport, bus, Arc::new(SystemClock), None);
//! axum::serve(listener, app.router()).await?;
//! ```

pub mod aggregator;
pub mod app;
pub mod config;
pub mod health;
pub mod integration;
pub mod publisher;
pub mod server;

pub use aggregator::Aggregator;
pub use app::CompositeApp;
pub use config::{Config, ConfigError};
pub use health::{CompositeHealth, HealthAggregator, Status};
pub use integration::{DownstreamClient, HttpCatalogTransport, SENTINEL_ITEM_ID, ServiceEndpoints};
pub use publisher::{EventPublisher, PendingPublish, Topics};
