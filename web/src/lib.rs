//! Axum integration for the catalog composite.
//!
//! The HTTP shell around the aggregator: error documents, validating
//! extractors, correlation id tracking and liveness.
//!
//! # Request Flow
//!
//! 1. **Correlation** id read or generated, request enters an `http_request` span
//! 2. **Extract** path, query and body; syntax errors become 400 documents
//! 3. **Call** the aggregator
//! 4. **Map** any [`CompositeError`](catalog_composite_core::error::CompositeError)
//!    to an [`AppError`] carrying the request path
//!
//! # Example
//!
//! ```ignore
//! use catalog_composite_web::{AppError, ValidPath, correlation_id_layer};
//! use axum::{Router, routing::get, Json};
//!
//! async fn get_aggregate(
//!     State(state): State<AppState>,
//!     OriginalUri(uri): OriginalUri,
//!     ValidPath(id): ValidPath<i32>,
//! ) -> Result<Json<AggregateView>, AppError> {
//!     let view = state
//!         .aggregator
//!         .get_aggregate(id, &ReadOptions::default())
//!         .await
//!         .map_err(|e| AppError::from(e).with_path(uri.path()))?;
//!     Ok(Json(view))
//! }
//!
//! let app = Router::new()
//!     .route("/aggregate/:id", get(get_aggregate))
//!     .layer(correlation_id_layer())
//!     .with_state(app_state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::{AppError, HttpErrorInfo, status_name};
pub use extractors::{CorrelationId, RoutingGroup, ValidJson, ValidPath, ValidQuery};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
