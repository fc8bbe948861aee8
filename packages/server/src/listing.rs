//! Response cache of the public restaurant listing.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::cache::spawn_sweep_task;
use common::{CacheConfig, TtlCache};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::AppError;
use crate::models::restaurant::{NormalizedListQuery, RestaurantListResponse};

/// Listing responses keyed by the normalized query signature.
///
/// Entries live for `listing_ttl_secs`. With `invalidate_on_write` every
/// restaurant or review write empties the cache, otherwise the TTL is the
/// only freshness bound.
#[derive(Clone)]
pub struct ListingCache {
    entries: Arc<TtlCache<String, RestaurantListResponse>>,
    ttl: Duration,
    invalidate_on_write: bool,
    /// Bumped on every invalidation; a load that raced with a write is not stored.
    generation: Arc<AtomicU64>,
}

impl ListingCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Arc::new(TtlCache::new()),
            ttl: Duration::from_secs(config.listing_ttl_secs),
            invalidate_on_write: config.invalidate_on_write,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serve `query` from the cache, or run `loader` and cache its result.
    pub async fn cached_list<F, Fut>(
        &self,
        query: &NormalizedListQuery,
        loader: F,
    ) -> Result<RestaurantListResponse, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RestaurantListResponse, AppError>>,
    {
        let key = query.cache_signature()?;
        if let Some(hit) = self.entries.get(&key) {
            debug!(key = %key, "Listing cache hit");
            return Ok(hit);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let fresh = loader().await?;
        if self.generation.load(Ordering::Acquire) == generation {
            self.entries.set(key.clone(), fresh.clone(), self.ttl);
            // An invalidation may have run between the check and the insert.
            if self.generation.load(Ordering::Acquire) != generation {
                self.entries.invalidate(&key);
            }
        }
        Ok(fresh)
    }

    /// Drop every cached listing after a write, if configured to.
    pub fn invalidate(&self) {
        if !self.invalidate_on_write {
            return;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        let dropped = self.entries.len();
        self.entries.clear();
        if dropped > 0 {
            debug!(dropped, "Listing cache invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start the background task that purges expired listings.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        spawn_sweep_task(self.entries.clone(), interval)
    }
}
