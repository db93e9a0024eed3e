//! In-memory feed cache with per-key locking
//!
//! Provides a `FeedCache` that maps a [`CacheKey`] to the most recently
//! generated feed for it. Each key owns its own async mutex, held for the
//! whole check-then-regenerate sequence, so concurrent requests for the same
//! key share one regeneration while other keys proceed independently.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::feed::FeedDocument;
use crate::options::CacheKey;

/// Number of distinct option sets kept when no capacity is configured
pub const DEFAULT_CAPACITY: usize = 256;

/// A generated feed together with when it was generated
#[derive(Debug, Clone)]
pub struct CachedFeed {
    pub document: Arc<FeedDocument>,
    /// Wall-clock generation time, reported to clients
    pub generated_at: DateTime<Utc>,
    /// Monotonic generation time, used for expiry
    refreshed_at: Instant,
}

impl CachedFeed {
    pub fn new(document: FeedDocument) -> Self {
        Self {
            document: Arc::new(document),
            generated_at: Utc::now(),
            refreshed_at: Instant::now(),
        }
    }

    /// Whether the entry is no older than `ttl`
    ///
    /// Age is measured on the monotonic clock, so wall-clock adjustments do
    /// not extend or cut short an entry's lifetime.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.refreshed_at.elapsed() <= ttl
    }
}

type Slot = Arc<AsyncMutex<Option<CachedFeed>>>;

/// Bounded map of option sets to generated feeds
///
/// The slot map is capped at a fixed capacity; the least recently requested
/// key is dropped when a new one would exceed it.
pub struct FeedCache {
    slots: Mutex<LruCache<CacheKey, Slot>>,
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl FeedCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached feed for `key`, regenerating it with `refresh` if it
    /// is missing or older than `ttl`
    ///
    /// The key's slot stays locked until `refresh` completes. A failed refresh
    /// leaves the previous entry (or its absence) in place and returns the
    /// error; the next call tries again.
    ///
    /// # Arguments
    /// * `key` - The option set the feed was generated for
    /// * `ttl` - Maximum age of an entry that may be served as is
    /// * `refresh` - Builds a new document; called at most once
    ///
    /// # Returns
    /// * `Ok(CachedFeed)` holding the fresh or newly generated entry
    /// * `Err(E)` passed through from `refresh`
    pub async fn get_or_refresh<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        refresh: F,
    ) -> Result<CachedFeed, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FeedDocument, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(ttl) {
                debug!(
                    generated_at = %cached.generated_at,
                    "using cached feed"
                );
                return Ok(cached.clone());
            }
        }

        let cached = CachedFeed::new(refresh().await?);
        *entry = Some(cached.clone());
        Ok(cached)
    }

    /// Look up or create the slot for `key`, marking it most recently used
    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }

        let slot: Slot = Arc::new(AsyncMutex::new(None));
        if let Some((evicted, _)) = slots.push(key.clone(), Arc::clone(&slot)) {
            debug!(
                max_items = evicted.max_items,
                sort = %evicted.sort,
                tags = %evicted.tags,
                "evicted least recently used feed"
            );
        }
        slot
    }

    fn lock_slots(&self) -> MutexGuard<'_, LruCache<CacheKey, Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned feed cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}
