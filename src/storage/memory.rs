//! Process-local storage backend.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::tables::Tables;
use super::{ChatRecord, ChatRecordRepository, SessionRecord, SessionRepository};
use crate::error::{CacheError, Result};

/// Keeps every table in memory. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| CacheError::Storage("memory store lock poisoned".to_string()))
    }

    /// Number of stored chat records.
    pub fn chat_count(&self) -> Result<usize> {
        Ok(self.tables()?.chat_records.len())
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self.tables()?.sessions.len())
    }
}

impl ChatRecordRepository for MemoryStore {
    fn upsert(&self, request: &str, reply: &str, frequency: u64) -> Result<()> {
        self.tables()?
            .upsert_chat(request, reply, frequency, Utc::now());
        Ok(())
    }

    fn top_by_frequency(&self, limit: usize) -> Result<Vec<ChatRecord>> {
        Ok(self.tables()?.top_chats(limit))
    }

    fn get(&self, request: &str) -> Result<Option<ChatRecord>> {
        Ok(self.tables()?.chat_records.get(request).cloned())
    }
}

impl SessionRepository for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.tables()?.sessions.get(id).cloned())
    }

    fn save(&self, record: SessionRecord) -> Result<()> {
        self.tables()?.sessions.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.tables()?.sessions.remove(id).is_some())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(self.tables()?.delete_expired_sessions(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_chat_roundtrip() {
        let store = MemoryStore::new();

        store.upsert("hi", "hello", 1).unwrap();
        store.upsert("hi", "hello", 2).unwrap();

        let record = ChatRecordRepository::get(&store, "hi").unwrap().unwrap();
        assert_eq!(record.frequency, 3);
        assert!(ChatRecordRepository::get(&store, "bye").unwrap().is_none());
        assert_eq!(store.chat_count().unwrap(), 1);
    }

    #[test]
    fn test_memory_store_sessions() {
        let store = MemoryStore::new();

        store.save(SessionRecord::empty("s1", Utc::now())).unwrap();
        assert!(store.load("s1").unwrap().is_some());
        assert!(store.delete("s1").unwrap());
        assert!(!store.delete("s1").unwrap());
        assert_eq!(store.session_count().unwrap(), 0);
    }
}
