//! Process-local key/value cache with per-entry expiry.
//!
//! Expired entries are dropped lazily on [`TtlCache::get`] and in bulk by
//! [`TtlCache::purge_expired`], which [`spawn_sweep_task`] runs periodically.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrent cache whose entries expire after a fixed time-to-live.
///
/// Concurrent `set` calls on the same key are last-writer-wins.
#[derive(Debug)]
pub struct TtlCache<K: Eq + Hash, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the stored value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // The read guard must be released before removing.
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Store `value` under `key` until `ttl` elapses.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Remove a single entry.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop all expired entries and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Spawn a background task that periodically purges expired cache entries.
pub fn spawn_sweep_task<K, V>(
    cache: Arc<TtlCache<K, V>>,
    sweep_interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        // `interval` panics on a zero period.
        let mut interval = tokio::time::interval(sweep_interval.max(Duration::from_millis(1)));

        loop {
            interval.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(removed, "Purged expired cache entries");
            }
        }
    })
}
