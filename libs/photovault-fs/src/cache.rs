//! Content cache for compressed renditions
//!
//! One process-wide bounded cache keyed by storage uri. Admission is best
//! effort: an entry may be evicted at any moment, so a miss always falls back
//! to the filesystem.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use mini_moka::sync::Cache;
use tracing::{debug, info, warn};

/// Cache sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total cost budget; costs are byte lengths
    pub max_cost: u64,
    /// Entries pre-allocated for the frequency tracking set
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cost: 1 << 30,
            initial_capacity: 10_000,
        }
    }
}

#[derive(Clone)]
struct Entry {
    bytes: Bytes,
    cost: u32,
}

pub struct ImageCache {
    inner: Cache<String, Entry>,
    max_cost: u64,
    closed: AtomicBool,
}

impl ImageCache {
    pub fn new(config: CacheConfig) -> Self {
        let inner = Cache::builder()
            .weigher(|_key: &String, entry: &Entry| entry.cost)
            .max_capacity(config.max_cost)
            .initial_capacity(config.initial_capacity)
            .build();
        Self {
            inner,
            max_cost: config.max_cost,
            closed: AtomicBool::new(false),
        }
    }

    /// Offer an entry to the cache
    ///
    /// Returns `false` when the entry is refused outright (closed cache or a
    /// cost above the whole budget). `true` does not guarantee the entry
    /// survives until the next `get`.
    pub fn set(&self, key: &str, bytes: Bytes, cost: u64) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        if cost > self.max_cost || cost > u64::from(u32::MAX) {
            warn!(key, cost, max_cost = self.max_cost, "Cache admission rejected");
            return false;
        }
        self.inner.insert(
            key.to_string(),
            Entry {
                bytes,
                cost: cost as u32,
            },
        );
        debug!(key, cost, "Cache entry set");
        true
    }

    /// Look up an entry; `None` is a plain miss
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.inner.get(&key.to_string()).map(|entry| entry.bytes)
    }

    pub fn remove(&self, key: &str) {
        self.inner.invalidate(&key.to_string());
    }

    /// Drop every entry and refuse further use
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.invalidate_all();
        info!("Image cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
