//! Storage Module
//!
//! Durable stores behind the cache's write-back hooks.
//!
//! # Backends
//! - `MemoryStore`: process-local tables, for tests and ephemeral runs
//! - `FileStore`: the same tables persisted as one JSON document

mod file;
mod memory;
mod tables;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Chat Record ==
/// A memoized request/reply pair and how often it has been asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Normalized request text, unique
    pub request: String,
    pub reply: String,
    pub frequency: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// == Session Record ==
/// Durable form of a session: its value bag encoded as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    /// JSON object of session values
    pub data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// A fresh record with an empty value bag.
    pub fn empty(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            data: "{}".to_string(),
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }
}

// == Repositories ==
/// Chat records keyed by request text.
pub trait ChatRecordRepository: Send + Sync {
    /// Inserts the record, or replaces its reply and adds `frequency` to its counter.
    fn upsert(&self, request: &str, reply: &str, frequency: u64) -> Result<()>;

    /// Up to `limit` records, most frequent first. Ties are ordered by request text.
    fn top_by_frequency(&self, limit: usize) -> Result<Vec<ChatRecord>>;

    fn get(&self, request: &str) -> Result<Option<ChatRecord>>;
}

/// Session records keyed by session ID.
pub trait SessionRepository: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<SessionRecord>>;

    /// Inserts or replaces the record with the same ID.
    fn save(&self, record: SessionRecord) -> Result<()>;

    /// Returns whether a record was removed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Removes every record whose `expires_at` is before `now`, returning their IDs.
    fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>>;
}
