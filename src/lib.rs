//! Write-back Cache - bounded in-memory caching with lazy persistence
//!
//! Provides an LRU cache with TTL expiry whose access-frequency counters and evicted
//! entries are written back to a durable store by a background sweeper.

pub mod api;
pub mod cache;
pub mod config;
pub mod consumers;
pub mod error;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, WriteBack};
pub use config::Config;
pub use consumers::{ChatMemoizer, SessionManager};
pub use error::{CacheError, Result};
pub use tasks::spawn_session_janitor;
