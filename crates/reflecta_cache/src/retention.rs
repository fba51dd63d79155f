use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

/// Keeps recently used temporary values strongly reachable.
///
/// A temporary cache entry only holds a weak reference, so without a
/// retention window its value would vanish the moment the last caller drops
/// it. Policies decide how many values stay pinned and which one goes first.
///
/// [`RetentionPolicy::on_access`] runs on the cache hit path under a shared
/// lock, so it takes `&self` and must not block other readers.
pub trait RetentionPolicy<K, V>: Send + Sync {
    /// Called when a temporary value is inserted or needs pinning again.
    fn on_insert(&mut self, key: &K, value: &Arc<V>);

    /// Records a read of `key`. Returns `false` when the value is no longer
    /// pinned and should be handed back through [`RetentionPolicy::on_insert`].
    fn on_access(&self, key: &K) -> bool;

    /// Called when the entry for `key` leaves the store or stops being temporary.
    fn on_remove(&mut self, key: &K);

    /// Releases every pinned value, returning how many were released.
    fn release_all(&mut self) -> usize;

    /// Number of values currently pinned.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Pin<V> {
    value: Arc<V>,
    last_used: AtomicU64,
}

/// Least-recently-used retention window with a fixed capacity.
///
/// Reads only bump an atomic tick on the pinned slot. The window is trimmed
/// on insert, where the slot with the oldest tick is released.
pub struct LruRetention<K, V> {
    capacity: usize,
    clock: AtomicU64,
    pinned: AHashMap<K, Pin<V>>,
}

impl<K, V> LruRetention<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: AtomicU64::new(0),
            pinned: AHashMap::with_capacity(capacity.min(64)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}

impl<K: Eq + Hash + Clone, V> LruRetention<K, V> {
    fn evict_oldest(&mut self) {
        let oldest = self
            .pinned
            .iter()
            .min_by_key(|(_, pin)| pin.last_used.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.pinned.remove(&key);
        }
    }
}

impl<K, V> RetentionPolicy<K, V> for LruRetention<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn on_insert(&mut self, key: &K, value: &Arc<V>) {
        if self.capacity == 0 {
            return;
        }
        let pin = Pin {
            value: Arc::clone(value),
            last_used: AtomicU64::new(self.tick()),
        };
        self.pinned.insert(key.clone(), pin);
        while self.pinned.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn on_access(&self, key: &K) -> bool {
        // Nothing is ever pinned by an empty window.
        if self.capacity == 0 {
            return true;
        }
        match self.pinned.get(key) {
            Some(pin) => {
                pin.last_used.store(self.tick(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn on_remove(&mut self, key: &K) {
        self.pinned.remove(key);
    }

    fn release_all(&mut self) -> usize {
        let released = self.pinned.len();
        self.pinned.clear();
        released
    }

    fn len(&self) -> usize {
        self.pinned.len()
    }
}

impl<K, V> Default for LruRetention<K, V> {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl<K, V> std::fmt::Debug for LruRetention<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruRetention")
            .field("capacity", &self.capacity)
            .field("pinned", &self.pinned.len())
            .finish()
    }
}
