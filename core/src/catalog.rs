//! Read contract of the three dependent services.
//!
//! [`CatalogTransport`] is the raw wire seam: one call per downstream request,
//! no retries, no breaker, no fallback. The downstream client in the service
//! crate layers resilience on top of it, and tests substitute a scripted mock.

use crate::error::CompositeError;
use crate::model::{Commentary, Item, ItemId, Rating};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Header used to route reads to an instance group; forwarded verbatim.
pub const GROUP_HEADER: &str = "X-group";

/// One of the dependent services.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Catalog item service (primary)
    Item,
    /// Peer ratings service
    Ratings,
    /// Commentary service
    Commentary,
}

impl Dependency {
    /// All dependencies, in health document order.
    pub const ALL: [Self; 3] = [Self::Item, Self::Ratings, Self::Commentary];

    /// Logical name, used in health documents, metric labels and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Ratings => "ratings",
            Self::Commentary => "commentary",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request read parameters.
///
/// `delay` and `fault_percent` are forwarded to the item service only; they
/// drive its fault injection. `group` goes to every read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Artificial delay requested from the item service, in seconds
    pub delay: u32,
    /// Probability (0..=100) that the item service fails the call
    pub fault_percent: u32,
    /// Value of the inbound `X-group` header, if any
    pub group: Option<String>,
}

impl ReadOptions {
    /// Options carrying only a routing group.
    #[must_use]
    pub fn with_group(group: Option<String>) -> Self {
        Self {
            group,
            ..Self::default()
        }
    }
}

/// Boxed future returned by [`CatalogTransport`] methods.
pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CompositeError>> + Send + 'a>>;

/// Single-shot access to the dependent services.
///
/// Implementations map transport failures to [`CompositeError::Transport`],
/// 404 to [`CompositeError::NotFound`], 422 to
/// [`CompositeError::InvalidInput`] and any other non-2xx status to
/// [`CompositeError::Upstream`].
///
/// Uses boxed futures so the client can hold an `Arc<dyn CatalogTransport>`.
pub trait CatalogTransport: Send + Sync {
    /// `GET {item}/item/{id}?delay=&faultPercent=`
    fn fetch_item<'a>(&'a self, id: ItemId, options: &'a ReadOptions) -> CatalogFuture<'a, Item>;

    /// `GET {ratings}/ratings?itemId=`
    fn fetch_ratings<'a>(
        &'a self,
        id: ItemId,
        options: &'a ReadOptions,
    ) -> CatalogFuture<'a, Vec<Rating>>;

    /// `GET {commentary}/commentary?itemId=`
    fn fetch_commentary<'a>(
        &'a self,
        id: ItemId,
        options: &'a ReadOptions,
    ) -> CatalogFuture<'a, Vec<Commentary>>;

    /// `GET {base}/health`; `Ok` means the dependency is up.
    fn probe(&self, dependency: Dependency) -> CatalogFuture<'_, ()>;
}
