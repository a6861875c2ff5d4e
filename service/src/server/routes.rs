//! Router configuration for the catalog composite.

use super::handlers::{
    create_aggregate, delete_aggregate, dependency_health, get_aggregate, metrics,
};
use super::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use catalog_composite_web::correlation_id_layer;
use catalog_composite_web::handlers::health_check;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `POST /aggregate`
/// - `GET /aggregate/:id`, `DELETE /aggregate/:id`
/// - `GET /health` (liveness), `GET /health/dependencies`
/// - `GET /metrics`
///
/// Every request runs inside the correlation id span.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/aggregate", post(create_aggregate))
        .route("/aggregate/:id", get(get_aggregate).delete(delete_aggregate))
        .route("/health", get(health_check))
        .route("/health/dependencies", get(dependency_health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
