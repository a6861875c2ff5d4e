//! HTTP API tests.
//!
//! Drive the full router with a scripted catalog and the in-memory event
//! bus: status codes, error documents, header forwarding and published
//! events.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use catalog_composite::{CompositeApp, CompositeHealth, Config, Status};
use catalog_composite_core::catalog::Dependency;
use catalog_composite_core::error::CompositeError;
use catalog_composite_core::model::{AggregateView, Commentary, Rating};
use catalog_composite_testing::{InMemoryEventBus, MockCatalog, test_clock};
use catalog_composite_web::HttpErrorInfo;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("SERVICE_ADDRESS", "composite-test:7000"),
        ("ITEM_TIMEOUT_MS", "500"),
        ("RETRY_MAX_ATTEMPTS", "2"),
        ("RETRY_WAIT_MS", "10"),
    ]);
    Config::from_lookup(|name| vars.get(name).map(ToString::to_string))
}

struct Harness {
    server: TestServer,
    app: CompositeApp,
    catalog: MockCatalog,
    bus: InMemoryEventBus,
}

fn harness() -> Harness {
    let catalog = MockCatalog::new();
    let bus = InMemoryEventBus::new();
    let app = CompositeApp::new(
        &test_config(),
        Arc::new(catalog.clone()),
        Arc::new(bus.clone()),
        Arc::new(test_clock()),
        None,
    );
    let server = TestServer::new(app.router()).expect("test server should start");

    Harness {
        server,
        app,
        catalog,
        bus,
    }
}

fn rating(item_id: i32) -> Rating {
    Rating {
        item_id,
        rating_id: 1,
        author: "author 1".to_string(),
        rate: 1,
        content: "content 1".to_string(),
        origin_address: Some("ratings-1:7002".to_string()),
    }
}

fn commentary(item_id: i32) -> Commentary {
    Commentary {
        item_id,
        commentary_id: 1,
        author: "author 1".to_string(),
        subject: "subject 1".to_string(),
        content: "content 1".to_string(),
        origin_address: Some("commentary-1:7003".to_string()),
    }
}

#[tokio::test]
async fn get_aggregate_returns_full_view() {
    let h = harness();
    h.catalog.respond_ratings(Ok(vec![rating(1)]));
    h.catalog.respond_commentary(Ok(vec![commentary(1)]));

    let response = h.server.get("/aggregate/1").await;

    response.assert_status(StatusCode::OK);
    let view: AggregateView = response.json();
    assert_eq!(view.id, 1);
    assert_eq!(view.ratings.len(), 1);
    assert_eq!(view.commentary.len(), 1);
    assert_eq!(view.service_addresses.composite, "composite-test:7000");
    assert_eq!(view.service_addresses.ratings, "ratings-1:7002");
    assert_eq!(view.service_addresses.commentary, "commentary-1:7003");
}

#[tokio::test]
async fn get_aggregate_forwards_query_and_group_header() {
    let h = harness();

    h.server
        .get("/aggregate/2")
        .add_query_param("delay", 3)
        .add_query_param("faultPercent", 10)
        .add_header(
            HeaderName::from_static("x-group"),
            HeaderValue::from_static("canary"),
        )
        .await
        .assert_status(StatusCode::OK);

    let item_options = h.catalog.last_options(Dependency::Item).unwrap();
    assert_eq!(item_options.delay, 3);
    assert_eq!(item_options.fault_percent, 10);
    assert_eq!(item_options.group.as_deref(), Some("canary"));
    let ratings_options = h.catalog.last_options(Dependency::Ratings).unwrap();
    assert_eq!(ratings_options.group.as_deref(), Some("canary"));
}

#[tokio::test]
async fn get_aggregate_not_found_renders_error_document() {
    let h = harness();
    h.catalog.respond_item(Err(CompositeError::NotFound(
        "No item found for itemId: 113".to_string(),
    )));

    let response = h.server.get("/aggregate/113").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let info: HttpErrorInfo = response.json();
    assert_eq!(info.path, "/aggregate/113");
    assert_eq!(info.http_status, "NOT_FOUND");
    assert_eq!(info.message, "No item found for itemId: 113");
}

#[tokio::test]
async fn get_aggregate_invalid_id_is_unprocessable() {
    let h = harness();

    let response = h.server.get("/aggregate/-1").await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let info: HttpErrorInfo = response.json();
    assert_eq!(info.path, "/aggregate/-1");
    assert_eq!(info.message, "Invalid itemId: -1");
    assert_eq!(h.catalog.item_calls(), 0);
}

#[tokio::test]
async fn get_aggregate_unparsable_id_is_bad_request() {
    let h = harness();

    let response = h.server.get("/aggregate/no-integer").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let info: HttpErrorInfo = response.json();
    assert_eq!(info.path, "/aggregate/no-integer");
    assert_eq!(info.http_status, "BAD_REQUEST");
}

#[tokio::test]
async fn get_aggregate_fault_percent_above_100_is_unprocessable() {
    let h = harness();

    h.server
        .get("/aggregate/1")
        .add_query_param("faultPercent", 101)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_aggregate_with_open_circuit_returns_fallback() {
    let h = harness();
    h.app.state().aggregator.client().policy().breaker().trip();

    let response = h.server.get("/aggregate/5").await;

    response.assert_status(StatusCode::OK);
    let view: AggregateView = response.json();
    assert_eq!(view.id, 5);
    assert_eq!(view.name, "Fallback item5");
    assert_eq!(view.service_addresses.item, "composite-test:7000");
    assert_eq!(h.catalog.item_calls(), 0);
}

#[tokio::test]
async fn get_aggregate_with_open_circuit_and_sentinel_is_not_found() {
    let h = harness();
    h.app.state().aggregator.client().policy().breaker().trip();

    let response = h.server.get("/aggregate/13").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let info: HttpErrorInfo = response.json();
    assert_eq!(info.message, "Item Id: 13 not found in fallback cache!");
}

#[tokio::test]
async fn get_aggregate_upstream_client_error_is_bad_gateway() {
    let h = harness();
    h.catalog.respond_item(Err(CompositeError::Upstream {
        status: 409,
        message: "conflict".to_string(),
    }));

    h.server
        .get("/aggregate/1")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn create_aggregate_is_accepted_and_published() {
    let h = harness();

    let response = h
        .server
        .post("/aggregate")
        .json(&json!({
            "id": 1,
            "name": "name 1",
            "weight": 1,
            "ratings": [{ "ratingId": 1, "author": "a", "rate": 1, "content": "c" }],
            "commentary": [{ "commentaryId": 1, "author": "a", "subject": "s", "content": "c" }]
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(h.bus.published_count(), 3);
}

#[tokio::test]
async fn create_aggregate_malformed_body_is_bad_request() {
    let h = harness();

    let response = h
        .server
        .post("/aggregate")
        .json(&json!({ "id": "one" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let info: HttpErrorInfo = response.json();
    assert_eq!(info.path, "/aggregate");
    assert_eq!(h.bus.published_count(), 0);
}

#[tokio::test]
async fn create_aggregate_channel_failure_is_service_unavailable() {
    let h = harness();
    h.bus.fail_publishes(true);

    h.server
        .post("/aggregate")
        .json(&json!({ "id": 1, "name": "n", "weight": 1 }))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn delete_aggregate_is_accepted_and_idempotent() {
    let h = harness();

    h.server
        .delete("/aggregate/1")
        .await
        .assert_status(StatusCode::ACCEPTED);
    h.server
        .delete("/aggregate/1")
        .await
        .assert_status(StatusCode::ACCEPTED);

    assert_eq!(h.bus.published_count(), 6);
}

#[tokio::test]
async fn dependency_health_reports_each_service() {
    let h = harness();
    h.catalog.set_down(Dependency::Commentary, true);

    let response = h.server.get("/health/dependencies").await;

    response.assert_status(StatusCode::OK);
    let health: CompositeHealth = response.json();
    assert_eq!(health.item.status, Status::Up);
    assert_eq!(health.ratings.status, Status::Up);
    assert_eq!(health.commentary.status, Status::Down);
}

#[tokio::test]
async fn liveness_and_correlation_id() {
    let h = harness();

    let response = h
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static("6f1c2b6e-52f4-4d0b-9d7e-0c8f3d1b2a90"),
        )
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(
        response.header("x-correlation-id").to_str().unwrap(),
        "6f1c2b6e-52f4-4d0b-9d7e-0c8f3d1b2a90"
    );
}

#[tokio::test]
async fn metrics_without_recorder_is_unavailable() {
    let h = harness();

    h.server
        .get("/metrics")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
