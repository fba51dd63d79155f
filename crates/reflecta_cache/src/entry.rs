use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

/// Retention policy for a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Held by a strong reference until removed.
    Permanent,
    /// Held weakly; reclaimable once nothing else keeps it alive.
    #[default]
    Temporary,
}

impl std::str::FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permanent" | "strong" => Ok(Self::Permanent),
            "temporary" | "weak" | "collectable" => Ok(Self::Temporary),
            other => Err(format!("unknown cache strategy `{other}`")),
        }
    }
}

#[derive(Debug)]
enum Slot<V> {
    Strong(Arc<V>),
    Weak(Weak<V>),
}

/// A cached value together with its key and retention mode.
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    key: K,
    slot: Slot<V>,
}

impl<K, V> CacheEntry<K, V> {
    pub fn new(key: K, value: &Arc<V>, strategy: CacheStrategy) -> Self {
        let slot = match strategy {
            CacheStrategy::Permanent => Slot::Strong(Arc::clone(value)),
            CacheStrategy::Temporary => Slot::Weak(Arc::downgrade(value)),
        };
        Self { key, slot }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn strategy(&self) -> CacheStrategy {
        match self.slot {
            Slot::Strong(_) => CacheStrategy::Permanent,
            Slot::Weak(_) => CacheStrategy::Temporary,
        }
    }

    /// The live value, or `None` once a temporary value was reclaimed.
    pub fn value(&self) -> Option<Arc<V>> {
        match &self.slot {
            Slot::Strong(value) => Some(Arc::clone(value)),
            Slot::Weak(value) => value.upgrade(),
        }
    }

    /// Replaces the value in place; the retention mode is kept.
    pub fn set_value(&mut self, value: &Arc<V>) {
        self.slot = match self.slot {
            Slot::Strong(_) => Slot::Strong(Arc::clone(value)),
            Slot::Weak(_) => Slot::Weak(Arc::downgrade(value)),
        };
    }

    pub fn is_collectable(&self) -> bool {
        matches!(self.slot, Slot::Weak(_))
    }

    pub fn is_collected(&self) -> bool {
        match &self.slot {
            Slot::Strong(_) => false,
            Slot::Weak(value) => value.strong_count() == 0,
        }
    }
}
