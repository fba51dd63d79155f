//! Generic cache store with pluggable locking and per-entry retention.
//!
//! Entries are either permanent (strongly held) or temporary (weakly held and
//! kept alive by a bounded LRU retention window). Reclaimed temporary entries
//! are pruned lazily when the store is measured or cleared.

pub mod entry;
pub mod lock;
pub mod retention;
pub mod store;

pub use entry::{CacheEntry, CacheStrategy};
pub use lock::{LockStrategy, StrategyLock};
pub use retention::{LruRetention, RetentionPolicy};
pub use store::{CacheStats, CacheStore, DEFAULT_TEMPORARY_CAPACITY};
