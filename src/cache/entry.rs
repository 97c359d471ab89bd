//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access-frequency tracking.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
    /// Successful lookups since the last write-back
    pub frequency: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL measured from `now`.
    ///
    /// A zero TTL is treated the same as no TTL, and so is one too long to represent.
    pub fn new(value: V, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: expiry_from(ttl, now),
            frequency: 0,
        }
    }

    // == Replace ==
    /// Overwrites value and expiry in place. The frequency counter is kept.
    pub fn replace(&mut self, value: V, ttl: Option<Duration>, now: Instant) {
        self.value = value;
        self.expires_at = expiry_from(ttl, now);
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(now))
    }

    // == Take Frequency ==
    /// Returns the accumulated frequency and resets it to zero.
    pub fn take_frequency(&mut self) -> u64 {
        std::mem::take(&mut self.frequency)
    }
}

fn expiry_from(ttl: Option<Duration>, now: Instant) -> Option<Instant> {
    ttl.filter(|ttl| !ttl.is_zero())
        .and_then(|ttl| now.checked_add(ttl))
}
