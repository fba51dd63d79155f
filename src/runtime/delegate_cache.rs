use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reflecta_cache::{CacheStats, CacheStore, CacheStrategy, LockStrategy};
use tracing::{debug, trace};

use super::{CallInfo, Thunk};
use crate::config::ReflectConfig;
use crate::error::Result;

/// Hit and miss counters for a [`DelegateCache`].
#[derive(Debug, Default)]
struct DelegateMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    created: AtomicU64,
    failed: AtomicU64,
}

impl DelegateMetrics {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, created: bool) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        if created {
            self.created.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time view of a delegate cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegateCacheStats {
    pub store: CacheStats,
    pub hits: u64,
    pub misses: u64,
    /// Thunks synthesized successfully.
    pub created: u64,
    /// Synthesis attempts that returned an error.
    pub failed: u64,
}

/// Maps descriptors to their synthesized thunks.
///
/// At most one thunk is synthesized per descriptor, even when several
/// threads ask for it at once; failed synthesis inserts nothing.
pub struct DelegateCache {
    store: CacheStore<CallInfo, Thunk>,
    metrics: DelegateMetrics,
    temporary_capacity: usize,
}

impl DelegateCache {
    pub fn new(lock_strategy: LockStrategy, temporary_capacity: usize) -> Self {
        Self {
            store: CacheStore::with_capacity(lock_strategy, temporary_capacity),
            metrics: DelegateMetrics::default(),
            temporary_capacity,
        }
    }

    pub fn from_config(config: &ReflectConfig) -> Self {
        Self::new(config.lock_strategy, config.temporary_capacity)
    }

    /// Cached thunk for `info`, if one is live.
    pub fn get(&self, info: &CallInfo) -> Option<Arc<Thunk>> {
        self.store.get(info)
    }

    /// Returns the cached thunk for `info`, synthesizing it with `create` on
    /// a miss.
    ///
    /// Asking for [`CacheStrategy::Permanent`] promotes a live temporary thunk
    /// in place; that counts as a hit.
    pub fn get_or_create(
        &self,
        info: &CallInfo,
        retention: CacheStrategy,
        create: impl FnOnce() -> Result<Thunk>,
    ) -> Result<Arc<Thunk>> {
        let mut ran = false;
        let outcome = self.store.get_or_insert_with(info.clone(), retention, || {
            ran = true;
            create()
        });
        match (&outcome, ran) {
            (_, false) => {
                self.metrics.record_hit();
                trace!(descriptor = %info, "delegate cache hit");
            }
            (Ok(thunk), true) => {
                self.metrics.record_miss(true);
                debug!(
                    descriptor = %info,
                    signature = thunk.signature_name(),
                    ?retention,
                    "thunk synthesized"
                );
            }
            (Err(error), true) => {
                self.metrics.record_miss(false);
                debug!(descriptor = %info, %error, "thunk synthesis failed");
            }
        }
        outcome
    }

    pub fn insert(&self, info: CallInfo, thunk: Thunk, retention: CacheStrategy) -> Arc<Thunk> {
        self.store.insert(info, thunk, retention)
    }

    pub fn remove(&self, info: &CallInfo) -> bool {
        self.store.remove(info)
    }

    pub fn contains(&self, info: &CallInfo) -> bool {
        self.store.contains(info)
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Number of live thunks, after pruning reclaimed ones.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    /// Unpins temporary thunks so they can be reclaimed.
    pub fn reclaim(&self) -> usize {
        self.store.reclaim()
    }

    pub fn descriptors(&self) -> Vec<CallInfo> {
        self.store.entries().into_iter().map(|(info, _)| info).collect()
    }

    pub fn lock_strategy(&self) -> LockStrategy {
        self.store.lock_strategy()
    }

    pub fn set_lock_strategy(&mut self, strategy: LockStrategy) {
        self.store.set_lock_strategy(strategy);
    }

    /// Most temporary thunks kept pinned at once.
    pub fn temporary_capacity(&self) -> usize {
        self.temporary_capacity
    }

    pub fn stats(&self) -> DelegateCacheStats {
        DelegateCacheStats {
            store: self.store.stats(),
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            created: self.metrics.created.load(Ordering::Relaxed),
            failed: self.metrics.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for DelegateCache {
    fn default() -> Self {
        Self::from_config(&ReflectConfig::default())
    }
}

impl std::fmt::Debug for DelegateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateCache")
            .field("lock_strategy", &self.lock_strategy())
            .field("temporary_capacity", &self.temporary_capacity)
            .field("metrics", &self.metrics)
            .finish()
    }
}
