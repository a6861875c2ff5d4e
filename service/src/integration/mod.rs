//! Access to the item, ratings and commentary services.

pub mod client;
pub mod http;

pub use client::{DownstreamClient, SENTINEL_ITEM_ID};
pub use http::{HttpCatalogTransport, ServiceEndpoints};
