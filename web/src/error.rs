//! Error rendering for HTTP handlers.
//!
//! Every error that reaches a client is rendered as the same JSON document:
//!
//! ```json
//! {
//!   "timestamp": "2025-01-01T00:00:00Z",
//!   "path": "/aggregate/13",
//!   "httpStatus": "NOT_FOUND",
//!   "message": "No item found for itemId: 13"
//! }
//! ```
//!
//! The dependent services answer errors with the same document, so
//! [`HttpErrorInfo`] is also what the downstream transport decodes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use catalog_composite_core::error::CompositeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpErrorInfo {
    /// When the error was produced
    pub timestamp: DateTime<Utc>,
    /// Request path that failed
    #[serde(default)]
    pub path: String,
    /// Status name, e.g. `UNPROCESSABLE_ENTITY`
    pub http_status: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl HttpErrorInfo {
    /// Build a document stamped with the current time.
    #[must_use]
    pub fn new(status: StatusCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            path: path.into(),
            http_status: status_name(status),
            message: message.into(),
        }
    }
}

/// Upper snake case name of a status, e.g. `404` becomes `NOT_FOUND`.
///
/// Statuses without a canonical reason fall back to their numeric code.
#[must_use]
pub fn status_name(status: StatusCode) -> String {
    status.canonical_reason().map_or_else(
        || status.as_str().to_string(),
        |reason| {
            reason
                .chars()
                .filter_map(|c| match c {
                    ' ' | '-' => Some('_'),
                    '\'' => None,
                    c => Some(c.to_ascii_uppercase()),
                })
                .collect()
        },
    )
}

/// Application error type for web handlers.
///
/// Carries the status and message of the error document plus the request
/// path, which extractors and handlers attach with [`AppError::with_path`].
///
/// # Examples
///
/// ```ignore
/// async fn handler(OriginalUri(uri): OriginalUri) -> Result<Json<AggregateView>, AppError> {
///     let view = aggregator
///         .get_aggregate(id, &options)
///         .await
///         .map_err(|e| AppError::from(e).with_path(uri.path()))?;
///     Ok(Json(view))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    path: Option<String>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Attach the request path reported in the error document.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404 Not Found
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 422 Unprocessable Entity
    #[must_use]
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// 500 Internal Server Error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Status the error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Path attached so far, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The error document this error renders as.
    #[must_use]
    pub fn to_info(&self) -> HttpErrorInfo {
        HttpErrorInfo::new(
            self.status,
            self.path.clone().unwrap_or_default(),
            self.message.clone(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", status_name(self.status), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let info = self.to_info();

        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    path = %info.path,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    path = %info.path,
                    message = %self.message,
                    "Request failed"
                );
            }
        } else {
            tracing::debug!(
                status = %self.status,
                path = %info.path,
                message = %self.message,
                "Request rejected"
            );
        }

        (self.status, Json(info)).into_response()
    }
}

impl From<CompositeError> for AppError {
    fn from(err: CompositeError) -> Self {
        match err {
            CompositeError::BadRequest(message) => Self::bad_request(message),
            CompositeError::NotFound(message) => Self::not_found(message),
            CompositeError::InvalidInput(message) => Self::unprocessable(message),
            other => {
                let status =
                    StatusCode::from_u16(other.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
                Self::new(status, other.to_string())
            }
        }
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}
