//! Chat Response Memoizer
//!
//! Caches replies keyed by normalized request text. Lookups accumulate frequency in
//! memory; the sweeper folds it into the durable record counter.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{Cache, CacheStats};
use crate::error::Result;
use crate::storage::ChatRecordRepository;

/// Normalizes request text into a cache key.
///
/// Trims, collapses whitespace runs into one space and lowercases.
pub fn normalize_request(request: &str) -> String {
    request
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// == Chat Memoizer ==
#[derive(Clone)]
pub struct ChatMemoizer {
    cache: Cache<String>,
    repo: Arc<dyn ChatRecordRepository>,
}

impl ChatMemoizer {
    /// Creates the memoizer and its cache. Write-backs upsert into `repo`.
    pub fn new(
        repo: Arc<dyn ChatRecordRepository>,
        capacity: usize,
        sweep_interval: Duration,
    ) -> Result<Self> {
        let sink = Arc::clone(&repo);
        let cache = Cache::with_interval(
            capacity,
            sweep_interval,
            move |request: &str, reply: &String, frequency: u64| {
                if let Err(err) = sink.upsert(request, reply, frequency) {
                    warn!("Failed to write back chat record '{}': {}", request, err);
                }
            },
        )?;

        Ok(Self { cache, repo })
    }

    // == Warm ==
    /// Seeds the cache with the most frequently asked records.
    ///
    /// Records are inserted least frequent first so the most frequent one ends up most
    /// recently used. Returns how many records were loaded.
    pub async fn warm(&self, limit: usize) -> Result<usize> {
        let limit = limit.min(self.cache.capacity().await);
        let records = self.repo.top_by_frequency(limit)?;
        let count = records.len();

        for record in records.into_iter().rev() {
            self.cache.set(record.request, record.reply, None).await;
        }

        info!("Warmed chat cache with {} records", count);
        Ok(count)
    }

    // == Lookup ==
    /// Returns the memoized reply for a request, counting the ask.
    pub async fn lookup(&self, request: &str) -> Option<String> {
        self.cache.get(&normalize_request(request)).await
    }

    // == Remember ==
    /// Stores a freshly produced reply.
    ///
    /// The ask is counted durably right away; later cache hits are counted lazily.
    pub async fn remember(&self, request: &str, reply: impl Into<String>) -> Result<()> {
        let key = normalize_request(request);
        let reply = reply.into();
        self.repo.upsert(&key, &reply, 1)?;
        self.cache.set(key, reply, None).await;
        Ok(())
    }

    /// Flushes pending counters and stops the sweeper.
    pub async fn stop(&self) {
        self.cache.stop().await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn cache(&self) -> &Cache<String> {
        &self.cache
    }
}
