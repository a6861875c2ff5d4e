//! Tests for the scripted catalog double

#![allow(clippy::unwrap_used)] // Tests can unwrap

use catalog_composite_core::catalog::{CatalogTransport, Dependency, ReadOptions};
use catalog_composite_core::error::CompositeError;
use catalog_composite_testing::MockCatalog;
use std::time::Duration;

#[tokio::test]
async fn defaults_echo_the_requested_item() {
    let catalog = MockCatalog::new();
    let options = ReadOptions::default();

    let item = catalog.fetch_item(42, &options).await.unwrap();

    assert_eq!(item, MockCatalog::default_item(42));
    assert!(catalog.fetch_ratings(42, &options).await.unwrap().is_empty());
    assert!(catalog.fetch_commentary(42, &options).await.unwrap().is_empty());
    assert_eq!(catalog.item_calls(), 1);
    assert_eq!(catalog.ratings_calls(), 1);
    assert_eq!(catalog.commentary_calls(), 1);
}

#[tokio::test]
async fn queued_answers_run_before_the_fixed_answer() {
    let catalog = MockCatalog::new();
    catalog.respond_item(Err(CompositeError::NotFound("gone".to_string())));
    catalog.queue_item(Ok(MockCatalog::default_item(1)));
    let options = ReadOptions::default();

    assert!(catalog.fetch_item(1, &options).await.is_ok());
    assert_eq!(
        catalog.fetch_item(1, &options).await,
        Err(CompositeError::NotFound("gone".to_string()))
    );
}

#[tokio::test]
async fn remembers_the_last_options_per_dependency() {
    let catalog = MockCatalog::new();

    catalog
        .fetch_item(1, &ReadOptions::with_group(Some("green".to_string())))
        .await
        .unwrap();

    assert_eq!(
        catalog.last_options(Dependency::Item).unwrap().group.as_deref(),
        Some("green")
    );
    assert!(catalog.last_options(Dependency::Ratings).is_none());
}

#[tokio::test]
async fn probes_follow_the_down_set() {
    let catalog = MockCatalog::new();
    catalog.set_down(Dependency::Item, true);

    assert!(catalog.probe(Dependency::Item).await.is_err());
    assert!(catalog.probe(Dependency::Commentary).await.is_ok());

    catalog.set_down(Dependency::Item, false);
    assert!(catalog.probe(Dependency::Item).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn delayed_items_wait_on_tokio_time() {
    let catalog = MockCatalog::new();
    catalog.delay_item(Duration::from_secs(30));
    let options = ReadOptions::default();

    let started = tokio::time::Instant::now();
    catalog.fetch_item(1, &options).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(30));
}
