//! Error taxonomy shared by the downstream client, the aggregator and the
//! HTTP layer.
//!
//! Each variant carries its own retry and circuit-breaker classification so
//! the resilience policy never has to inspect messages.

use thiserror::Error;

/// Errors surfaced by composite operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositeError {
    /// Request could not be parsed (bad id, query or body syntax)
    #[error("{0}")]
    BadRequest(String),

    /// Request parsed but is semantically invalid
    #[error("{0}")]
    InvalidInput(String),

    /// No such item (also returned for the reserved sentinel id)
    #[error("{0}")]
    NotFound(String),

    /// Primary dependency exceeded its per-attempt deadline
    #[error("{0}")]
    Timeout(String),

    /// Connection or decode failure talking to a dependency
    #[error("{0}")]
    Transport(String),

    /// Circuit breaker rejected the call and no fallback applied
    #[error("{0}")]
    CircuitOpen(String),

    /// Dependency answered with an unexpected status
    #[error("{message}")]
    Upstream {
        /// Status returned by the dependency
        status: u16,
        /// Message extracted from the dependency's error document
        message: String,
    },

    /// Event could not be handed to the publish pool or the channel
    #[error("{0}")]
    EventSubmission(String),
}

/// Coarse classification of a [`CompositeError`], used for metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CompositeError::BadRequest`]
    BadRequest,
    /// See [`CompositeError::InvalidInput`]
    InvalidInput,
    /// See [`CompositeError::NotFound`]
    NotFound,
    /// See [`CompositeError::Timeout`]
    Timeout,
    /// See [`CompositeError::Transport`]
    Transport,
    /// See [`CompositeError::CircuitOpen`]
    CircuitOpen,
    /// See [`CompositeError::Upstream`]
    Upstream,
    /// See [`CompositeError::EventSubmission`]
    EventSubmission,
}

impl ErrorKind {
    /// Label value for metrics and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::CircuitOpen => "circuit_open",
            Self::Upstream => "upstream",
            Self::EventSubmission => "event_submission",
        }
    }
}

impl CompositeError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::Transport,
            Self::CircuitOpen(_) => ErrorKind::CircuitOpen,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::EventSubmission(_) => ErrorKind::EventSubmission,
        }
    }

    /// Whether a retry with identical parameters may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }

    /// Whether the circuit breaker records this outcome as neither success
    /// nor failure.
    #[must_use]
    pub const fn is_ignored_by_breaker(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidInput(_))
    }

    /// HTTP status code this error is rendered with.
    ///
    /// Upstream 5xx statuses pass through; any other upstream status is
    /// reported as 502.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::InvalidInput(_) => 422,
            Self::NotFound(_) => 404,
            Self::Timeout(_) => 504,
            Self::Transport(_) | Self::CircuitOpen(_) | Self::EventSubmission(_) => 503,
            Self::Upstream { status, .. } => {
                if *status >= 500 && *status <= 599 {
                    *status
                } else {
                    502
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_and_transport_are_transient() {
        assert!(CompositeError::Timeout("t".into()).is_transient());
        assert!(CompositeError::Transport("t".into()).is_transient());
        assert!(!CompositeError::NotFound("n".into()).is_transient());
        assert!(
            !CompositeError::Upstream {
                status: 500,
                message: "boom".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn breaker_ignores_client_errors() {
        assert!(CompositeError::NotFound("n".into()).is_ignored_by_breaker());
        assert!(CompositeError::InvalidInput("i".into()).is_ignored_by_breaker());
        assert!(!CompositeError::Timeout("t".into()).is_ignored_by_breaker());
    }

    #[test]
    fn upstream_status_mapping() {
        let server = CompositeError::Upstream {
            status: 500,
            message: String::new(),
        };
        let teapot = CompositeError::Upstream {
            status: 418,
            message: String::new(),
        };
        assert_eq!(server.http_status(), 500);
        assert_eq!(teapot.http_status(), 502);
        assert_eq!(CompositeError::Timeout(String::new()).http_status(), 504);
        assert_eq!(CompositeError::NotFound(String::new()).http_status(), 404);
    }
}
