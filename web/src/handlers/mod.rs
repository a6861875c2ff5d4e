//! HTTP request handlers shared by every deployment of the composite.

pub mod health;

pub use health::{HealthResponse, health_check};
