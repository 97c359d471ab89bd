//! Response DTOs for the operational API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, SweepReport};

/// Statistics of one cache instance
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub flushes: u64,
    pub sweeps: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    pub capacity: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            flushes: stats.flushes,
            sweeps: stats.sweeps,
            total_entries: stats.total_entries,
            capacity: stats.capacity,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Chat memoization cache
    pub chat: CacheStatsResponse,
    /// Session cache
    pub sessions: CacheStatsResponse,
}

impl StatsResponse {
    pub fn new(chat: CacheStats, sessions: CacheStats) -> Self {
        Self {
            chat: chat.into(),
            sessions: sessions.into(),
        }
    }
}

/// Response body for POST /maintenance/sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub chat: SweepReport,
    pub sessions: SweepReport,
}

/// Response body for POST /maintenance/purge
#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    /// Number of expired sessions deleted
    pub removed: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
