//! Scripted stand-in for the dependent services.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use catalog_composite_core::catalog::{CatalogFuture, CatalogTransport, Dependency, ReadOptions};
use catalog_composite_core::error::CompositeError;
use catalog_composite_core::model::{Commentary, Item, ItemId, Rating};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Origin address reported by default mock records.
pub const MOCK_ITEM_ADDRESS: &str = "item-mock:7001";

#[derive(Debug, Default)]
struct Script {
    queued_items: VecDeque<Result<Item, CompositeError>>,
    item: Option<Result<Item, CompositeError>>,
    item_delay: Duration,
    ratings: Option<Result<Vec<Rating>, CompositeError>>,
    commentary: Option<Result<Vec<Commentary>, CompositeError>>,
    down: HashSet<Dependency>,
    last_options: HashMap<Dependency, ReadOptions>,
}

/// Scripted [`CatalogTransport`] with call counters.
///
/// Unless told otherwise the item service echoes the requested id, and
/// ratings and commentary are empty. Responses can be fixed for every call
/// (`respond_*`) or queued for the next item calls only (`queue_item`).
///
/// # Example
///
/// ```
/// use catalog_composite_testing::MockCatalog;
/// use catalog_composite_core::catalog::{CatalogTransport, ReadOptions};
/// use catalog_composite_core::error::CompositeError;
///
/// # async fn example() {
/// let catalog = MockCatalog::new();
/// catalog.queue_item(Err(CompositeError::Transport("refused".into())));
///
/// let options = ReadOptions::default();
/// assert!(catalog.fetch_item(1, &options).await.is_err());
/// assert_eq!(catalog.fetch_item(1, &options).await.unwrap().id, 1);
/// assert_eq!(catalog.item_calls(), 2);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockCatalog {
    script: Arc<Mutex<Script>>,
    item_calls: Arc<AtomicUsize>,
    ratings_calls: Arc<AtomicUsize>,
    commentary_calls: Arc<AtomicUsize>,
}

impl MockCatalog {
    /// Create a mock with healthy defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The record the item service returns by default for `id`
    #[must_use]
    pub fn default_item(id: ItemId) -> Item {
        let mut item = Item::new(id, format!("item {id}"), 1);
        item.origin_address = Some(MOCK_ITEM_ADDRESS.to_string());
        item
    }

    /// Answer every item call with `result`
    pub fn respond_item(&self, result: Result<Item, CompositeError>) {
        self.script.lock().unwrap().item = Some(result);
    }

    /// Answer the next item call with `result`, ahead of any fixed answer
    pub fn queue_item(&self, result: Result<Item, CompositeError>) {
        self.script.lock().unwrap().queued_items.push_back(result);
    }

    /// Delay every item call
    pub fn delay_item(&self, delay: Duration) {
        self.script.lock().unwrap().item_delay = delay;
    }

    /// Answer every ratings call with `result`
    pub fn respond_ratings(&self, result: Result<Vec<Rating>, CompositeError>) {
        self.script.lock().unwrap().ratings = Some(result);
    }

    /// Answer every commentary call with `result`
    pub fn respond_commentary(&self, result: Result<Vec<Commentary>, CompositeError>) {
        self.script.lock().unwrap().commentary = Some(result);
    }

    /// Mark a dependency's health endpoint as down (or up again)
    pub fn set_down(&self, dependency: Dependency, down: bool) {
        let mut script = self.script.lock().unwrap();
        if down {
            script.down.insert(dependency);
        } else {
            script.down.remove(&dependency);
        }
    }

    /// Number of item calls made
    #[must_use]
    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    /// Number of ratings calls made
    #[must_use]
    pub fn ratings_calls(&self) -> usize {
        self.ratings_calls.load(Ordering::SeqCst)
    }

    /// Number of commentary calls made
    #[must_use]
    pub fn commentary_calls(&self) -> usize {
        self.commentary_calls.load(Ordering::SeqCst)
    }

    /// Options passed on the most recent read of `dependency`
    #[must_use]
    pub fn last_options(&self, dependency: Dependency) -> Option<ReadOptions> {
        self.script
            .lock()
            .unwrap()
            .last_options
            .get(&dependency)
            .cloned()
    }

    fn remember(&self, dependency: Dependency, options: &ReadOptions) {
        self.script
            .lock()
            .unwrap()
            .last_options
            .insert(dependency, options.clone());
    }
}

impl CatalogTransport for MockCatalog {
    fn fetch_item<'a>(&'a self, id: ItemId, options: &'a ReadOptions) -> CatalogFuture<'a, Item> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        self.remember(Dependency::Item, options);
        let (delay, result) = {
            let mut script = self.script.lock().unwrap();
            let result = script
                .queued_items
                .pop_front()
                .or_else(|| script.item.clone())
                .unwrap_or_else(|| Ok(Self::default_item(id)));
            (script.item_delay, result)
        };
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }

    fn fetch_ratings<'a>(
        &'a self,
        _id: ItemId,
        options: &'a ReadOptions,
    ) -> CatalogFuture<'a, Vec<Rating>> {
        self.ratings_calls.fetch_add(1, Ordering::SeqCst);
        self.remember(Dependency::Ratings, options);
        let result = self
            .script
            .lock()
            .unwrap()
            .ratings
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { result })
    }

    fn fetch_commentary<'a>(
        &'a self,
        _id: ItemId,
        options: &'a ReadOptions,
    ) -> CatalogFuture<'a, Vec<Commentary>> {
        self.commentary_calls.fetch_add(1, Ordering::SeqCst);
        self.remember(Dependency::Commentary, options);
        let result = self
            .script
            .lock()
            .unwrap()
            .commentary
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { result })
    }

    fn probe(&self, dependency: Dependency) -> CatalogFuture<'_, ()> {
        let down = self.script.lock().unwrap().down.contains(&dependency);
        Box::pin(async move {
            if down {
                Err(CompositeError::Transport(format!("{dependency} is down")))
            } else {
                Ok(())
            }
        })
    }
}
