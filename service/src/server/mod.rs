//! HTTP server for the catalog composite.
//!
//! - Application state shared by handlers
//! - Aggregate, health and metrics handlers
//! - Router configuration

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
