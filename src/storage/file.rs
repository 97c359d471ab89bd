//! JSON file storage backend.
//!
//! Every mutation rewrites the whole document through a temporary file and a rename,
//! so a crash mid-write leaves the previous version in place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::tables::Tables;
use super::{ChatRecord, ChatRecordRepository, SessionRecord, SessionRepository};
use crate::error::{CacheError, Result};

/// Durable store backed by a single JSON document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl FileStore {
    /// Opens the document at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store. An unreadable document is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tables = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Tables::default(),
            Ok(text) => serde_json::from_str(&text).map_err(|err| {
                CacheError::Storage(format!("corrupt store {}: {}", path.display(), err))
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => Tables::default(),
            Err(err) => return Err(err.into()),
        };

        debug!(
            "Opened file store {} ({} chat records, {} sessions)",
            path.display(),
            tables.chat_records.len(),
            tables.sessions.len()
        );

        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| CacheError::Storage("file store lock poisoned".to_string()))
    }

    /// Applies a mutation and persists the result while still holding the table lock.
    ///
    /// The in-memory tables only change once the new document is on disk.
    fn mutate<T>(&self, apply: impl FnOnce(&mut Tables) -> T) -> Result<T> {
        let mut tables = self.tables()?;
        let mut next = tables.clone();
        let out = apply(&mut next);
        self.persist(&next)?;
        *tables = next;
        Ok(out)
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        let text = serde_json::to_string_pretty(tables)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ChatRecordRepository for FileStore {
    fn upsert(&self, request: &str, reply: &str, frequency: u64) -> Result<()> {
        self.mutate(|tables| tables.upsert_chat(request, reply, frequency, Utc::now()))
    }

    fn top_by_frequency(&self, limit: usize) -> Result<Vec<ChatRecord>> {
        Ok(self.tables()?.top_chats(limit))
    }

    fn get(&self, request: &str) -> Result<Option<ChatRecord>> {
        Ok(self.tables()?.chat_records.get(request).cloned())
    }
}

impl SessionRepository for FileStore {
    fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.tables()?.sessions.get(id).cloned())
    }

    fn save(&self, record: SessionRecord) -> Result<()> {
        self.mutate(|tables| {
            tables.sessions.insert(record.id.clone(), record);
        })
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.mutate(|tables| tables.sessions.remove(id).is_some())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.mutate(|tables| tables.delete_expired_sessions(now))
    }
}
