//! Cache Module
//!
//! Bounded in-memory caching with TTL expiry, LRU eviction and write-back of
//! access-frequency counters.

mod entry;
mod handle;
mod lru;
mod stats;
mod store;
mod writeback;


use std::time::Duration;

// Re-export public types
pub use entry::CacheEntry;
pub(crate) use handle::Shared;
pub use handle::Cache;
pub use lru::{Handle, LruList};
pub use stats::CacheStats;
pub use store::{CacheStore, SweepReport};
pub use writeback::{FlushReason, FlushRecord, WriteBack};

// == Public Constants ==
/// Interval between maintenance passes unless configured otherwise
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
