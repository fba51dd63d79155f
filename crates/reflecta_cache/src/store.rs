use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::entry::{CacheEntry, CacheStrategy};
use crate::lock::{LockStrategy, StrategyLock};
use crate::retention::{LruRetention, RetentionPolicy};

/// Default number of temporary values kept pinned by a store.
pub const DEFAULT_TEMPORARY_CAPACITY: usize = 1024;

type EntryMap<K, V> = AHashMap<K, CacheEntry<K, V>>;

enum Lookup {
    Hit,
    Created,
    Promoted,
}

/// Thread-safe key to value map with per-entry retention.
///
/// Lookups never fail: a missing or reclaimed value is reported as `None`.
/// Reclaimed temporary entries are pruned lazily by [`CacheStore::count`],
/// [`CacheStore::sweep`] and [`CacheStore::clear`]; there is no background
/// sweeper.
///
/// Hits on temporary entries only take the retention window's shared lock,
/// so concurrent readers are not serialized by it.
pub struct CacheStore<K, V> {
    entries: StrategyLock<EntryMap<K, V>>,
    retention: RwLock<Box<dyn RetentionPolicy<K, V>>>,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(strategy: LockStrategy) -> Self {
        Self::with_capacity(strategy, DEFAULT_TEMPORARY_CAPACITY)
    }

    /// Creates a store that pins at most `temporary_capacity` temporary values.
    pub fn with_capacity(strategy: LockStrategy, temporary_capacity: usize) -> Self {
        Self::with_retention(strategy, LruRetention::new(temporary_capacity))
    }

    pub fn with_retention(
        strategy: LockStrategy,
        retention: impl RetentionPolicy<K, V> + 'static,
    ) -> Self {
        Self {
            entries: StrategyLock::new(strategy, AHashMap::new()),
            retention: RwLock::new(Box::new(retention)),
        }
    }

    /// Creates or replaces the entry for `key`. Concurrent inserts for the
    /// same key race and the last writer wins.
    pub fn insert(&self, key: K, value: V, strategy: CacheStrategy) -> Arc<V> {
        let value = Arc::new(value);
        self.insert_arc(key, Arc::clone(&value), strategy);
        value
    }

    pub fn insert_arc(&self, key: K, value: Arc<V>, strategy: CacheStrategy) {
        self.entries.write(|entries| {
            entries.insert(key.clone(), CacheEntry::new(key.clone(), &value, strategy));
        });
        self.retain(&key, &value, strategy);
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.entries.read(|entries| {
            entries
                .get(key)
                .and_then(|entry| entry.value().map(|value| (value, entry.strategy())))
        });
        let (value, strategy) = found?;
        if strategy == CacheStrategy::Temporary {
            self.touch(key, &value);
        }
        Some(value)
    }

    /// Returns the live value for `key`, creating it with `create` on a miss.
    ///
    /// The probe runs under the read side of the lock. On a miss the lock is
    /// taken exclusively, the probe repeats in case another thread won the
    /// race, and `create` runs while the exclusive side is held, so it is
    /// invoked at most once per key across concurrent callers. A failed
    /// `create` leaves the store untouched.
    ///
    /// A [`CacheStrategy::Permanent`] request promotes a live temporary entry
    /// without calling `create`. A temporary request never demotes a
    /// permanent entry.
    ///
    /// `create` must not call back into this store.
    pub fn get_or_insert_with<E>(
        &self,
        key: K,
        strategy: CacheStrategy,
        create: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let outcome = self.entries.read_or_write(
            |entries| {
                let entry = entries.get(&key)?;
                let needs_promotion = strategy == CacheStrategy::Permanent
                    && entry.strategy() == CacheStrategy::Temporary;
                if needs_promotion {
                    return None;
                }
                entry
                    .value()
                    .map(|value| Ok((value, entry.strategy(), Lookup::Hit)))
            },
            |entries| {
                let live = entries.get(&key).and_then(CacheEntry::value);
                let (value, lookup) = match live {
                    Some(value) => (value, Lookup::Promoted),
                    None => (Arc::new(create()?), Lookup::Created),
                };
                entries.insert(key.clone(), CacheEntry::new(key.clone(), &value, strategy));
                Ok((value, strategy, lookup))
            },
        );
        let (value, retained_as, lookup) = outcome?;
        match lookup {
            Lookup::Hit if retained_as == CacheStrategy::Temporary => self.touch(&key, &value),
            Lookup::Hit => {}
            Lookup::Created => {
                trace!(strategy = ?retained_as, "cache entry created");
                self.retain(&key, &value, retained_as);
            }
            Lookup::Promoted => {
                trace!("cache entry promoted to permanent");
                self.retain(&key, &value, retained_as);
            }
        }
        Ok(value)
    }

    /// Removes the entry for `key`, reporting whether one existed.
    pub fn remove(&self, key: &K) -> bool {
        let removed = self.entries.write(|entries| entries.remove(key).is_some());
        if removed {
            self.retention.write().on_remove(key);
        }
        removed
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.read(|entries| {
            entries
                .get(key)
                .is_some_and(|entry| !entry.is_collected())
        })
    }

    pub fn clear(&self) {
        let dropped = self.entries.write(|entries| {
            let dropped = entries.len();
            entries.clear();
            dropped
        });
        self.retention.write().release_all();
        debug!(dropped, "cache store cleared");
    }

    /// Prunes reclaimed entries, then returns the number of live ones.
    pub fn count(&self) -> usize {
        self.sweep();
        self.entries.read(|entries| entries.len())
    }

    /// Removes every entry whose temporary value has been reclaimed.
    pub fn sweep(&self) -> usize {
        let has_collected = self
            .entries
            .read(|entries| entries.values().any(CacheEntry::is_collected));
        if !has_collected {
            return 0;
        }
        let swept = self.entries.write(|entries| {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_collected());
            before - entries.len()
        });
        if swept > 0 {
            debug!(swept, "swept reclaimed cache entries");
        }
        swept
    }

    /// Snapshot of the live entries. Reclaimed entries are skipped, not removed.
    pub fn entries(&self) -> Vec<(K, Arc<V>)> {
        self.entries.read(|entries| {
            entries
                .values()
                .filter_map(|entry| entry.value().map(|value| (entry.key().clone(), value)))
                .collect()
        })
    }

    /// Unpins every temporary value, making it reclaimable as soon as no
    /// caller holds it. Returns the number of values released.
    pub fn reclaim(&self) -> usize {
        let released = self.retention.write().release_all();
        debug!(released, "released pinned temporary values");
        released
    }

    pub fn lock_strategy(&self) -> LockStrategy {
        self.entries.strategy()
    }

    /// Swaps the lock guarding the map. The exclusive borrow guarantees that
    /// nobody else is reading or writing while the swap happens.
    pub fn set_lock_strategy(&mut self, strategy: LockStrategy) {
        let previous = self.entries.strategy();
        self.entries.switch(strategy);
        debug!(%previous, current = %strategy, "cache store lock strategy changed");
    }

    pub fn stats(&self) -> CacheStats {
        let (permanent, temporary, collected) = self.entries.read(|entries| {
            entries.values().fold((0, 0, 0), |(p, t, c), entry| {
                match (entry.strategy(), entry.is_collected()) {
                    (CacheStrategy::Permanent, _) => (p + 1, t, c),
                    (CacheStrategy::Temporary, false) => (p, t + 1, c),
                    (CacheStrategy::Temporary, true) => (p, t, c + 1),
                }
            })
        });
        CacheStats {
            permanent,
            temporary,
            collected,
            pinned: self.retention.read().len(),
            lock_strategy: self.lock_strategy(),
        }
    }

    fn retain(&self, key: &K, value: &Arc<V>, strategy: CacheStrategy) {
        match strategy {
            CacheStrategy::Temporary => self.retention.write().on_insert(key, value),
            // A key that switched from temporary to permanent must not stay pinned.
            CacheStrategy::Permanent => self.retention.write().on_remove(key),
        }
    }

    // Records a hit, pinning the value again if the window already let it go.
    fn touch(&self, key: &K, value: &Arc<V>) {
        let pinned = self.retention.read().on_access(key);
        if !pinned {
            self.retention.write().on_insert(key, value);
        }
    }
}

impl<K, V> Default for CacheStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(LockStrategy::default())
    }
}

impl<K, V> std::fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("lock_strategy", &self.entries.strategy())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub permanent: usize,
    pub temporary: usize,
    /// Temporary entries whose value was reclaimed but not swept yet.
    pub collected: usize,
    /// Temporary values currently held by the retention window.
    pub pinned: usize,
    pub lock_strategy: LockStrategy,
}

impl CacheStats {
    pub fn live(&self) -> usize {
        self.permanent + self.temporary
    }
}
