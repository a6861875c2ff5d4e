//! reqwest implementation of [`CatalogTransport`].
//!
//! One request per call. Non-2xx answers are decoded as the structured
//! error document to recover the dependency's message:
//!
//! | Status | Error |
//! |---|---|
//! | 404 | `NotFound` |
//! | 422 | `InvalidInput` |
//! | other | `Upstream { status }` |
//!
//! Connection failures and undecodable bodies are `Transport`; a reqwest
//! timeout is `Timeout`.

use catalog_composite_core::catalog::{
    CatalogFuture, CatalogTransport, Dependency, GROUP_HEADER, ReadOptions,
};
use catalog_composite_core::error::CompositeError;
use catalog_composite_core::model::{Commentary, Item, ItemId, Rating};
use catalog_composite_web::HttpErrorInfo;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Base URLs of the three dependent services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Item service
    pub item: String,
    /// Ratings service
    pub ratings: String,
    /// Commentary service
    pub commentary: String,
}

impl ServiceEndpoints {
    /// Base URL of `dependency`, without a trailing slash.
    #[must_use]
    pub fn base(&self, dependency: Dependency) -> &str {
        let url = match dependency {
            Dependency::Item => &self.item,
            Dependency::Ratings => &self.ratings,
            Dependency::Commentary => &self.commentary,
        };
        url.trim_end_matches('/')
    }
}

/// HTTP client for the item, ratings and commentary services.
#[derive(Clone, Debug)]
pub struct HttpCatalogTransport {
    client: Client,
    endpoints: ServiceEndpoints,
    secondary_timeout: Duration,
    health_timeout: Duration,
}

impl HttpCatalogTransport {
    /// Create a transport.
    ///
    /// Item reads carry no client-side timeout; the resilience policy owns
    /// that deadline.
    #[must_use]
    pub fn new(
        endpoints: ServiceEndpoints,
        secondary_timeout: Duration,
        health_timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoints,
            secondary_timeout,
            health_timeout,
        }
    }

    /// Configured endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        dependency: Dependency,
        request: RequestBuilder,
        options: &ReadOptions,
    ) -> Result<T, CompositeError> {
        let request = match &options.group {
            Some(group) => request.header(GROUP_HEADER, group),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| send_error(dependency, &e))?;
        let response = check_status(dependency, response).await?;

        response.json::<T>().await.map_err(|e| {
            CompositeError::Transport(format!(
                "Could not decode {dependency} response: {e}"
            ))
        })
    }
}

impl CatalogTransport for HttpCatalogTransport {
    fn fetch_item<'a>(&'a self, id: ItemId, options: &'a ReadOptions) -> CatalogFuture<'a, Item> {
        Box::pin(async move {
            let url = format!("{}/item/{id}", self.endpoints.base(Dependency::Item));
            tracing::debug!(%url, delay = options.delay, fault_percent = options.fault_percent, "Fetching item");

            let request = self.client.get(url).query(&[
                ("delay", options.delay),
                ("faultPercent", options.fault_percent),
            ]);
            let item: Item = self.get_json(Dependency::Item, request, options).await?;

            tracing::debug!(item_id = item.id, "Found item");
            Ok(item)
        })
    }

    fn fetch_ratings<'a>(
        &'a self,
        id: ItemId,
        options: &'a ReadOptions,
    ) -> CatalogFuture<'a, Vec<Rating>> {
        Box::pin(async move {
            let url = format!("{}/ratings", self.endpoints.base(Dependency::Ratings));
            let request = self
                .client
                .get(url)
                .query(&[("itemId", id)])
                .timeout(self.secondary_timeout);
            let ratings: Vec<Rating> = self.get_json(Dependency::Ratings, request, options).await?;

            tracing::debug!(item_id = id, count = ratings.len(), "Found ratings");
            Ok(ratings)
        })
    }

    fn fetch_commentary<'a>(
        &'a self,
        id: ItemId,
        options: &'a ReadOptions,
    ) -> CatalogFuture<'a, Vec<Commentary>> {
        Box::pin(async move {
            let url = format!("{}/commentary", self.endpoints.base(Dependency::Commentary));
            let request = self
                .client
                .get(url)
                .query(&[("itemId", id)])
                .timeout(self.secondary_timeout);
            let commentary: Vec<Commentary> = self
                .get_json(Dependency::Commentary, request, options)
                .await?;

            tracing::debug!(item_id = id, count = commentary.len(), "Found commentary");
            Ok(commentary)
        })
    }

    fn probe(&self, dependency: Dependency) -> CatalogFuture<'_, ()> {
        Box::pin(async move {
            let url = format!("{}/health", self.endpoints.base(dependency));
            let response = self
                .client
                .get(url)
                .timeout(self.health_timeout)
                .send()
                .await
                .map_err(|e| send_error(dependency, &e))?;
            check_status(dependency, response).await.map(|_| ())
        })
    }
}

fn send_error(dependency: Dependency, err: &reqwest::Error) -> CompositeError {
    if err.is_timeout() {
        CompositeError::Timeout(format!("Request to {dependency} timed out"))
    } else {
        CompositeError::Transport(format!("Request to {dependency} failed: {err}"))
    }
}

async fn check_status(dependency: Dependency, response: Response) -> Result<Response, CompositeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);

    Err(match status {
        StatusCode::NOT_FOUND => CompositeError::NotFound(message),
        StatusCode::UNPROCESSABLE_ENTITY => CompositeError::InvalidInput(message),
        _ => {
            tracing::warn!(%dependency, status = status.as_u16(), %body, "Unexpected HTTP error");
            CompositeError::Upstream {
                status: status.as_u16(),
                message,
            }
        }
    })
}

/// Message of an error document, else the raw body, else the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(info) = serde_json::from_str::<HttpErrorInfo>(body) {
        if !info.message.is_empty() {
            return info.message;
        }
    }
    if body.trim().is_empty() {
        status.to_string()
    } else {
        body.to_string()
    }
}
