//! Cache Store Module
//!
//! Lock-free core state: a key index over an O(1) LRU list of entries. Callers hold the
//! cache lock around every method here; nothing in this module invokes the write-back hook.
//! Records that must be written back are returned to the caller instead.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::cache::lru::{Handle, LruList};
use crate::cache::{CacheEntry, CacheStats, FlushReason, FlushRecord};
use crate::error::{CacheError, Result};

// == Sweep Report ==
/// Summary of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries removed because their TTL elapsed
    pub expired: usize,
    /// Live entries whose frequency was reported and reset
    pub flushed: usize,
}

// == Cache Store ==
/// Bounded cache storage with LRU eviction, TTL and frequency counters.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key -> position in `order`
    index: HashMap<String, Handle>,
    /// Entries ordered from most to least recently touched
    order: LruList<(String, CacheEntry<V>)>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `capacity` entries.
    ///
    /// Fails with [`CacheError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }
        Ok(Self {
            index: HashMap::with_capacity(capacity),
            order: LruList::with_capacity(capacity),
            stats: CacheStats::new(capacity),
            capacity,
        })
    }

    // == Set ==
    /// Stores a value with optional TTL.
    ///
    /// An existing key keeps its frequency and moves to the front. A new key at capacity
    /// first evicts the least recently used entry, which is returned so the caller can
    /// write it back once the lock is released.
    pub fn set(
        &mut self,
        key: String,
        value: V,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Option<FlushRecord<V>> {
        if let Some(&handle) = self.index.get(&key) {
            if let Some((_, entry)) = self.order.get_mut(handle) {
                entry.replace(value, ttl, now);
            }
            self.order.touch(handle);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let handle = self
            .order
            .push_front((key.clone(), CacheEntry::new(value, ttl, now)));
        self.index.insert(key, handle);
        self.stats.set_total_entries(self.index.len());

        evicted
    }

    fn evict_oldest(&mut self) -> Option<FlushRecord<V>> {
        let (_, (key, entry)) = self.order.evict_oldest()?;
        self.index.remove(&key);
        self.stats.record_eviction();
        self.stats.record_flushes(1);
        Some(FlushRecord::new(
            key,
            entry.value,
            entry.frequency,
            FlushReason::Evicted,
        ))
    }

    // == Get ==
    /// Retrieves a clone of the value by key.
    ///
    /// A present but expired entry is reported as absent and left for the next sweep.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let Some(&handle) = self.index.get(key) else {
            self.stats.record_miss();
            return None;
        };

        let value = match self.order.get_mut(handle) {
            Some((_, entry)) if !entry.is_expired(now) => {
                entry.frequency += 1;
                entry.value.clone()
            }
            _ => {
                self.stats.record_miss();
                return None;
            }
        };

        self.order.touch(handle);
        self.stats.record_hit();
        Some(value)
    }

    // == Delete ==
    /// Removes an entry by key without writing it back.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let handle = self
            .index
            .remove(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        self.order.remove(handle);
        self.stats.set_total_entries(self.index.len());
        Ok(())
    }

    // == Exists ==
    /// True if the key is physically resident, expired or not.
    pub fn exists(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the entry for a key without touching recency or frequency.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        let handle = *self.index.get(key)?;
        self.order.get(handle).map(|(_, entry)| entry)
    }

    // == Sweep ==
    /// Runs one maintenance pass at `now`.
    ///
    /// Expired entries are removed and returned with their frequency. Live entries with a
    /// non-zero frequency are returned with a cloned value and their counter reset.
    pub fn sweep(&mut self, now: Instant) -> (Vec<FlushRecord<V>>, SweepReport) {
        let mut records = Vec::new();
        let mut report = SweepReport::default();

        for handle in self.order.handles() {
            let expired = match self.order.get_mut(handle) {
                Some((_, entry)) if entry.is_expired(now) => true,
                Some((key, entry)) => {
                    if entry.frequency > 0 {
                        let frequency = entry.take_frequency();
                        records.push(FlushRecord::new(
                            key.clone(),
                            entry.value.clone(),
                            frequency,
                            FlushReason::Frequency,
                        ));
                        report.flushed += 1;
                    }
                    false
                }
                None => false,
            };

            if expired {
                if let Some((key, entry)) = self.order.remove(handle) {
                    self.index.remove(&key);
                    records.push(FlushRecord::new(
                        key,
                        entry.value,
                        entry.frequency,
                        FlushReason::Expired,
                    ));
                    report.expired += 1;
                }
            }
        }

        self.stats.record_expirations(report.expired);
        self.stats.record_flushes(records.len());
        self.stats.record_sweep();
        self.stats.set_total_entries(self.index.len());
        (records, report)
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().map(|(key, _)| key.clone()).collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.index.len());
        stats
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Checks that the index and the recency list describe the same key set.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.index.len() == self.order.len()
            && self.index.len() <= self.capacity
            && self.index.iter().all(|(key, &handle)| {
                self.order.get(handle).map(|(k, _)| k == key).unwrap_or(false)
            })
    }
}
