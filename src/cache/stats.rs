//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and write-backs.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key absent or logically expired)
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Number of entries removed by a sweep because their TTL elapsed
    pub expirations: u64,
    /// Number of records handed to the write-back hook
    pub flushes: u64,
    /// Number of completed maintenance passes
    pub sweeps: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn record_flushes(&mut self, count: usize) {
        self.flushes += count as u64;
    }

    pub fn record_sweep(&mut self) {
        self.sweeps += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
