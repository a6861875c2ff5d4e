//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation id
//! - [`RoutingGroup`]: the optional `X-group` routing header
//! - [`ValidPath`], [`ValidQuery`], [`ValidJson`]: the stock extractors with
//!   rejections rendered as a 400 error document
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     correlation_id: CorrelationId,
//!     ValidPath(id): ValidPath<i32>,
//!     RoutingGroup(group): RoutingGroup,
//! ) -> Result<Json<AggregateView>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, id, "Reading aggregate");
//!     ...
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, OriginalUri, Path, Query, Request},
    http::request::Parts,
};
use catalog_composite_core::catalog::GROUP_HEADER;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Taken from request extensions when the correlation middleware ran, else
/// from the `X-Correlation-ID` header, else freshly generated.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Value of the `X-group` routing header, forwarded to downstream reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingGroup(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for RoutingGroup
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let group = parts
            .headers
            .get(GROUP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        Ok(Self(group))
    }
}

fn request_path(parts: &Parts) -> String {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path().to_string(), |uri| uri.path().to_string())
}

/// [`Path`] that rejects with a 400 error document.
#[derive(Debug, Clone, Copy)]
pub struct ValidPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => {
                Err(AppError::bad_request(rejection.body_text()).with_path(request_path(parts)))
            }
        }
    }
}

/// [`Query`] that rejects with a 400 error document.
#[derive(Debug, Clone, Copy)]
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => {
                Err(AppError::bad_request(rejection.body_text()).with_path(request_path(parts)))
            }
        }
    }
}

/// [`Json`] body that rejects with a 400 error document.
#[derive(Debug, Clone, Copy)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let path = req
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| req.uri().path().to_string(), |uri| uri.path().to_string());

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text()).with_path(path)),
        }
    }
}
