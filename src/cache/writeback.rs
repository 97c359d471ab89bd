//! Write-back Contract
//!
//! The hook through which the cache reports `(key, value, frequency)` triples to a
//! slower durable store. Invocations are fire-and-forget: the cache never looks at the
//! outcome, never retries and never logs it.

// == Write Back Trait ==
/// Persists a cache entry to a backing store.
///
/// Called after the store lock has been released, once per flushed entry, so tasks the hook
/// hands work to may use the cache. The hook must not block on [`Cache::stop`] or on
/// [`Cache::write_back_settled`] for the key being written, since both wait for it.
///
/// [`Cache::stop`]: crate::cache::Cache::stop
/// [`Cache::write_back_settled`]: crate::cache::Cache::write_back_settled
pub trait WriteBack<V>: Send + Sync {
    fn write_back(&self, key: &str, value: &V, frequency: u64);
}

impl<V, F> WriteBack<V> for F
where
    F: Fn(&str, &V, u64) + Send + Sync,
{
    fn write_back(&self, key: &str, value: &V, frequency: u64) {
        self(key, value, frequency)
    }
}

// == Flush Reason ==
/// Why an entry is being written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Displaced by LRU eviction on insert
    Evicted,
    /// TTL elapsed; removed by a sweep
    Expired,
    /// Accumulated lookups reported by a sweep; entry stays resident
    Frequency,
}

// == Flush Record ==
/// A triple copied out of the locked store, waiting to be handed to [`WriteBack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushRecord<V> {
    pub key: String,
    pub value: V,
    pub frequency: u64,
    pub reason: FlushReason,
}

impl<V> FlushRecord<V> {
    pub fn new(key: String, value: V, frequency: u64, reason: FlushReason) -> Self {
        Self {
            key,
            value,
            frequency,
            reason,
        }
    }

    /// Hands the record to the write-back hook, consuming it.
    pub fn deliver(self, writeback: &dyn WriteBack<V>) {
        writeback.write_back(&self.key, &self.value, self.frequency);
    }
}
