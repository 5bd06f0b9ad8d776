//! Process-wide cache of compiled mapping functions.
//!
//! Entries are keyed by [`Fingerprint`] and hold a type-erased compiled
//! function plus a hit counter. Every `collect_per_items` insertions the
//! cache evicts entries whose hit count is at or below
//! `collect_hit_count_min`. Eviction runs before the insertion that
//! triggered it, so the fresh entry always survives.
//!
//! Purging drops every entry and then notifies purge subscribers
//! synchronously on the purging thread.

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fingerprint::Fingerprint;

pub const DEFAULT_COLLECT_PER_ITEMS: usize = 1000;
pub const DEFAULT_COLLECT_HIT_COUNT_MIN: u64 = 0;

fn default_collect_per_items() -> usize {
    DEFAULT_COLLECT_PER_ITEMS
}

fn default_collect_hit_count_min() -> u64 {
    DEFAULT_COLLECT_HIT_COUNT_MIN
}

/// Eviction thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Insertions between garbage collections
    #[serde(default = "default_collect_per_items")]
    pub collect_per_items: usize,

    /// Entries with at most this many hits are evicted
    #[serde(default = "default_collect_hit_count_min")]
    pub collect_hit_count_min: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            collect_per_items: DEFAULT_COLLECT_PER_ITEMS,
            collect_hit_count_min: DEFAULT_COLLECT_HIT_COUNT_MIN,
        }
    }
}

/// Handle returned by [`ConversionCache::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type PurgeCallback = Arc<dyn Fn() + Send + Sync>;

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub insertions: u64,
    pub collections: u64,
    pub purges: u64,
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    hits: AtomicU64,
}

/// Concurrent cache of compiled mapping functions.
pub struct ConversionCache {
    config: CacheConfig,
    entries: DashMap<Fingerprint, CacheEntry>,
    since_collect: AtomicUsize,
    insertions: AtomicU64,
    collections: AtomicU64,
    purges: AtomicU64,
    next_subscription: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, PurgeCallback)>>,
}

impl ConversionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            since_collect: AtomicUsize::new(0),
            insertions: AtomicU64::new(0),
            collections: AtomicU64::new(0),
            purges: AtomicU64::new(0),
            next_subscription: AtomicU64::new(0),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up an entry and count the hit.
    ///
    /// Returns `None` when absent or when the entry holds a different type.
    pub fn get<V: Any + Send + Sync>(&self, fingerprint: &Fingerprint) -> Option<Arc<V>> {
        let value = {
            let entry = self.entries.get(fingerprint)?;
            entry.hits.fetch_add(1, Ordering::Relaxed);
            Arc::clone(&entry.value)
        };
        value.downcast::<V>().ok()
    }

    /// Insert an entry with a zero hit count, replacing any previous one.
    pub fn insert<V: Any + Send + Sync>(&self, fingerprint: Fingerprint, value: Arc<V>) {
        let threshold = self.config.collect_per_items.max(1);
        if self.since_collect.fetch_add(1, Ordering::AcqRel) + 1 >= threshold {
            self.collect_garbage();
        }

        let value: Arc<dyn Any + Send + Sync> = value;
        self.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                hits: AtomicU64::new(0),
            },
        );
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the cached entry or build, insert and return a new one.
    ///
    /// Concurrent misses may both build; the last insert wins and both
    /// results are valid.
    pub fn get_or_build<V, E, F>(&self, fingerprint: &Fingerprint, build: F) -> Result<Arc<V>, E>
    where
        V: Any + Send + Sync,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get::<V>(fingerprint) {
            return Ok(hit);
        }

        debug!(
            type_name = fingerprint.type_name(),
            direction = ?fingerprint.direction(),
            fields = fingerprint.field_names().len(),
            "Conversion cache miss, compiling"
        );
        let value = Arc::new(build()?);
        self.insert(fingerprint.clone(), Arc::clone(&value));
        Ok(value)
    }

    /// Drop one entry. Returns true if it was present.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Current hit count of an entry, without counting a hit.
    pub fn hit_count(&self, fingerprint: &Fingerprint) -> Option<u64> {
        self.entries
            .get(fingerprint)
            .map(|e| e.hits.load(Ordering::Relaxed))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict entries at or below the hit threshold. Returns the number evicted.
    pub fn collect_garbage(&self) -> usize {
        let min = self.config.collect_hit_count_min;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.hits.load(Ordering::Relaxed) > min);
        self.since_collect.store(0, Ordering::Release);
        self.collections.fetch_add(1, Ordering::Relaxed);

        let evicted = before.saturating_sub(self.entries.len());
        info!(evicted, remaining = self.entries.len(), "Conversion cache collected");
        evicted
    }

    /// Drop every entry and notify subscribers.
    pub fn purge(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.since_collect.store(0, Ordering::Release);
        self.purges.fetch_add(1, Ordering::Relaxed);
        info!(dropped, "Conversion cache purged");

        let callbacks: Vec<PurgeCallback> = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Register a callback run after every purge.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let callback: PurgeCallback = Arc::new(callback);
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, callback));
        id
    }

    /// Remove a purge callback. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            insertions: self.insertions.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConversionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for ConversionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

static GLOBAL_CACHE: OnceLock<Arc<ConversionCache>> = OnceLock::new();

/// The process-wide cache, created with default thresholds on first use.
pub fn global_cache() -> Arc<ConversionCache> {
    Arc::clone(GLOBAL_CACHE.get_or_init(|| Arc::new(ConversionCache::default())))
}

/// Create the process-wide cache with `config` unless it already exists.
///
/// Returns false if the cache was already initialised.
pub fn init_global_cache(config: CacheConfig) -> bool {
    GLOBAL_CACHE.set(Arc::new(ConversionCache::new(config))).is_ok()
}
