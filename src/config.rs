//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Longest accepted session lifetime: ten years, in seconds.
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of memoized chat replies
    pub chat_capacity: usize,
    /// Maximum number of sessions held in memory
    pub session_capacity: usize,
    /// Interval in seconds between cache maintenance passes
    pub sweep_interval: u64,
    /// Number of most frequent chat records loaded at startup
    pub warm_top_n: usize,
    /// Session lifetime in seconds when the caller gives none
    pub session_ttl: u64,
    /// Interval in seconds between purges of expired stored sessions
    pub session_purge_interval: u64,
    /// Directory holding the durable store
    pub data_dir: PathBuf,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CHAT_CACHE_CAPACITY` - Chat cache entries (default: 500)
    /// - `SESSION_CACHE_CAPACITY` - Session cache entries (default: 100)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `WARM_TOP_N` - Chat records loaded at startup (default: 500)
    /// - `SESSION_TTL` - Default session lifetime in seconds (default: 1800)
    /// - `SESSION_PURGE_INTERVAL` - Stored-session purge frequency in seconds (default: 60)
    /// - `DATA_DIR` - Durable store directory (default: ./data)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chat_capacity: env_or("CHAT_CACHE_CAPACITY", defaults.chat_capacity),
            session_capacity: env_or("SESSION_CACHE_CAPACITY", defaults.session_capacity),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            warm_top_n: env_or("WARM_TOP_N", defaults.warm_top_n),
            session_ttl: env_or("SESSION_TTL", defaults.session_ttl),
            session_purge_interval: env_or(
                "SESSION_PURGE_INTERVAL",
                defaults.session_purge_interval,
            ),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Rejects values the caches cannot run with.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.chat_capacity == 0, "CHAT_CACHE_CAPACITY must be at least 1"),
            (self.session_capacity == 0, "SESSION_CACHE_CAPACITY must be at least 1"),
            (self.sweep_interval == 0, "SWEEP_INTERVAL must be at least 1"),
            (self.session_ttl == 0, "SESSION_TTL must be at least 1"),
            (
                self.session_ttl > MAX_SESSION_TTL_SECS,
                "SESSION_TTL must be at most ten years",
            ),
            (
                self.session_purge_interval == 0,
                "SESSION_PURGE_INTERVAL must be at least 1",
            ),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(CacheError::InvalidConfig(message.to_string())),
            None => Ok(()),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl)
    }

    pub fn session_purge_interval(&self) -> Duration {
        Duration::from_secs(self.session_purge_interval)
    }

    /// Path of the JSON store document.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat_capacity: 500,
            session_capacity: 100,
            sweep_interval: 60,
            warm_top_n: 500,
            session_ttl: 1800,
            session_purge_interval: 60,
            data_dir: PathBuf::from("./data"),
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
