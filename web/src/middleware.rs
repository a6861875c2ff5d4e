//! Request correlation for the composite API.
//!
//! Every inbound request runs inside an `http_request` span tagged with its
//! correlation id and `X-group` routing value, so the dependency reads and
//! event publishes it triggers share one trace. The id is taken from
//! `X-Correlation-ID` when it parses as a UUID, else generated, stored as a
//! [`CorrelationId`] extension for handlers and echoed on the response.

use crate::extractors::CorrelationId;
use axum::{extract::Request, http::HeaderValue, response::Response};
use catalog_composite_core::catalog::GROUP_HEADER;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{Instrument, field};
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Layer that correlates requests; install it outermost after tracing.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// See [`correlation_id_layer`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelatedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelatedService { inner }
    }
}

/// Service produced by [`CorrelationIdLayer`].
#[derive(Clone, Debug)]
pub struct CorrelatedService<S> {
    inner: S,
}

fn incoming_id(req: &Request) -> CorrelationId {
    let id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    CorrelationId(id)
}

impl<S> Service<Request> for CorrelatedService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = incoming_id(&req);
        let group = req
            .headers()
            .get(GROUP_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id.0,
            method = %req.method(),
            path = req.uri().path(),
            group,
            status = field::Empty,
        );
        req.extensions_mut().insert(correlation_id);

        let fut = self.inner.call(req).instrument(span.clone());

        Box::pin(async move {
            let mut response = fut.await?;
            span.record("status", response.status().as_u16());

            // A hyphenated UUID is always a valid header value.
            if let Ok(value) = HeaderValue::from_str(&correlation_id.0.to_string()) {
                response.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}
