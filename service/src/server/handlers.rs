//! Aggregate, dependency health and metrics endpoints.

use super::state::AppState;
use crate::health::CompositeHealth;
use axum::{
    Json,
    extract::{OriginalUri, State},
    http::StatusCode,
};
use catalog_composite_core::catalog::ReadOptions;
use catalog_composite_core::model::{AggregateSpec, AggregateView, ItemId};
use catalog_composite_web::{AppError, CorrelationId, RoutingGroup, ValidJson, ValidPath, ValidQuery};
use serde::Deserialize;

/// Fault injection parameters of `GET /aggregate/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuery {
    /// Seconds the item service should wait before answering
    #[serde(default)]
    pub delay: u32,
    /// Percentage of item calls that should fail
    #[serde(default)]
    pub fault_percent: u32,
}

/// Create an aggregate.
///
/// ```text
/// POST /aggregate  → 202 Accepted
/// ```
///
/// # Errors
///
/// Error document for an invalid body, an id below 1 or a publish failure.
pub async fn create_aggregate(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    OriginalUri(uri): OriginalUri,
    ValidJson(spec): ValidJson<AggregateSpec>,
) -> Result<StatusCode, AppError> {
    tracing::debug!(correlation_id = %correlation_id.0, item_id = spec.id, "createAggregate");

    state
        .aggregator
        .create_aggregate(&spec)
        .await
        .map_err(|e| AppError::from(e).with_path(uri.path()))?;

    Ok(StatusCode::ACCEPTED)
}

/// Read an aggregate.
///
/// ```text
/// GET /aggregate/{id}?delay=0&faultPercent=0  → 200 + AggregateView
/// ```
///
/// The `X-group` header, when present, is forwarded to every downstream read.
///
/// # Errors
///
/// Error document when the id or query is invalid or the item read fails.
pub async fn get_aggregate(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    OriginalUri(uri): OriginalUri,
    ValidPath(id): ValidPath<ItemId>,
    ValidQuery(query): ValidQuery<ReadQuery>,
    RoutingGroup(group): RoutingGroup,
) -> Result<Json<AggregateView>, AppError> {
    tracing::debug!(correlation_id = %correlation_id.0, item_id = id, "getAggregate");

    let options = ReadOptions {
        delay: query.delay,
        fault_percent: query.fault_percent,
        group,
    };

    let view = state
        .aggregator
        .get_aggregate(id, &options)
        .await
        .map_err(|e| AppError::from(e).with_path(uri.path()))?;

    Ok(Json(view))
}

/// Delete an aggregate. Idempotent.
///
/// ```text
/// DELETE /aggregate/{id}  → 202 Accepted
/// ```
///
/// # Errors
///
/// Error document for an id below 1 or a publish failure.
pub async fn delete_aggregate(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    OriginalUri(uri): OriginalUri,
    ValidPath(id): ValidPath<ItemId>,
) -> Result<StatusCode, AppError> {
    tracing::debug!(correlation_id = %correlation_id.0, item_id = id, "deleteAggregate");

    state
        .aggregator
        .delete_aggregate(id)
        .await
        .map_err(|e| AppError::from(e).with_path(uri.path()))?;

    Ok(StatusCode::ACCEPTED)
}

/// Health of the dependent services. Always 200.
///
/// ```text
/// GET /health/dependencies
/// ```
pub async fn dependency_health(State(state): State<AppState>) -> Json<CompositeHealth> {
    Json(state.health.aggregate_health().await)
}

/// Prometheus metrics.
///
/// ```text
/// GET /metrics
/// ```
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    state.metrics.as_ref().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "metrics recorder not installed".to_string(),
            )
        },
        |handle| (StatusCode::OK, handle.render()),
    )
}
