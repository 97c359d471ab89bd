//! Session Store
//!
//! Serves sessions from memory and persists mutations lazily: a changed session is
//! written to the repository by the next sweep, on eviction, or on shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{Cache, CacheStats};
use crate::error::{CacheError, Result};
use crate::storage::{SessionRecord, SessionRepository};

// == Session ==
/// A session's value bag and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub values: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            values: HashMap::new(),
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    /// Decodes a stored record. Empty data is an empty bag.
    pub fn from_record(record: SessionRecord) -> Result<Self> {
        let values = if record.data.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&record.data)?
        };

        Ok(Self {
            id: record.id,
            values,
            created_at: record.created_at,
            updated_at: record.updated_at,
            expires_at: record.expires_at,
        })
    }

    /// Encodes the session for storage, stamping `updated_at` with `now`.
    pub fn to_record(&self, now: DateTime<Utc>) -> Result<SessionRecord> {
        Ok(SessionRecord {
            id: self.id.clone(),
            data: serde_json::to_string(&self.values)?,
            created_at: self.created_at,
            updated_at: now,
            expires_at: self.expires_at,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Time left before expiry, or None for an open-ended session.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

// == Session Manager ==
#[derive(Clone)]
pub struct SessionManager {
    cache: Cache<Session>,
    repo: Arc<dyn SessionRepository>,
    default_ttl: Duration,
}

impl SessionManager {
    /// Creates the manager and its cache. Write-backs save the session into `repo`.
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        capacity: usize,
        sweep_interval: Duration,
        default_ttl: Duration,
    ) -> Result<Self> {
        if default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "session TTL must be greater than zero".to_string(),
            ));
        }
        expiry_after(Utc::now(), default_ttl)?;

        let sink = Arc::clone(&repo);
        let cache = Cache::with_interval(
            capacity,
            sweep_interval,
            move |id: &str, session: &Session, _frequency: u64| {
                let saved = session
                    .to_record(Utc::now())
                    .and_then(|record| sink.save(record));
                if let Err(err) = saved {
                    warn!("Failed to write back session '{}': {}", id, err);
                }
            },
        )?;

        Ok(Self {
            cache,
            repo,
            default_ttl,
        })
    }

    // == Get Session ==
    /// Returns the session, loading it from the repository on a cache miss.
    ///
    /// An unknown or expired ID yields a fresh session, which is saved immediately.
    pub async fn get_session(&self, id: &str) -> Result<Session> {
        if let Some(session) = self.cache.get(id).await {
            return Ok(session);
        }
        // An evicted copy may still be on its way to the repository.
        self.cache.write_back_settled(id).await;

        let now = Utc::now();
        let stored = match self.repo.load(id)? {
            Some(record) => Some(Session::from_record(record)?),
            None => None,
        };

        let session = match stored {
            Some(session) if !session.is_expired(now) => session,
            expired => {
                if expired.is_some() {
                    debug!("Session '{}' expired in storage, starting fresh", id);
                }
                let mut fresh = Session::new(id, now);
                fresh.expires_at = Some(expiry_after(now, self.default_ttl)?);
                self.repo.save(fresh.to_record(now)?)?;
                fresh
            }
        };

        self.cache
            .set(id, session.clone(), session.remaining(now))
            .await;
        Ok(session)
    }

    // == Set Value ==
    /// Sets one value and extends the session by `ttl` (the default when None or zero).
    ///
    /// Fails with [`CacheError::InvalidConfig`] when the resulting expiry is not a valid date.
    pub async fn set_value(
        &self,
        id: &str,
        key: impl Into<String>,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<Session> {
        let mut session = self.get_session(id).await?;
        session.values.insert(key.into(), value);
        self.store_mutation(session, ttl).await
    }

    /// Removes one value, returning the updated session.
    pub async fn remove_value(&self, id: &str, key: &str) -> Result<Session> {
        let mut session = self.get_session(id).await?;
        session.values.remove(key);
        self.store_mutation(session, None).await
    }

    async fn store_mutation(
        &self,
        mut session: Session,
        ttl: Option<Duration>,
    ) -> Result<Session> {
        let ttl = ttl.filter(|ttl| !ttl.is_zero()).unwrap_or(self.default_ttl);
        let now = Utc::now();
        let expires_at = expiry_after(now, ttl)?;
        session.updated_at = now;
        session.expires_at = Some(expires_at);

        self.cache
            .set(session.id.clone(), session.clone(), Some(ttl))
            .await;
        // The lookup raises the entry's frequency, so the next sweep writes it back.
        self.cache.get(&session.id).await;
        Ok(session)
    }

    // == Delete Session ==
    /// Removes the session from the repository and the cache.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.repo.delete(id)?;
        match self.cache.delete(id).await {
            Ok(()) | Err(CacheError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    // == Purge Expired ==
    /// Deletes sessions whose stored expiry has passed. Returns how many were removed.
    ///
    /// Pending mutations are flushed first so a session extended in memory is not
    /// purged on the strength of a stale stored expiry.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.cache.sweep_now().await;

        let expired = self.repo.delete_expired(Utc::now())?;
        for id in &expired {
            match self.cache.delete(id).await {
                Ok(()) | Err(CacheError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(expired.len())
    }

    /// Flushes pending sessions and stops the sweeper.
    pub async fn stop(&self) {
        self.cache.stop().await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn cache(&self) -> &Cache<Session> {
        &self.cache
    }
}

/// `now + ttl`, or an error when the sum is not a representable date.
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| CacheError::InvalidConfig(format!("session TTL out of range: {:?}", ttl)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::mpsc;

    const TTL: Duration = Duration::from_secs(1800);

    fn manager(capacity: usize) -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let manager =
            SessionManager::new(store.clone(), capacity, Duration::from_secs(60), TTL).unwrap();
        (manager, store)
    }

    fn stored(store: &MemoryStore, id: &str) -> Session {
        Session::from_record(store.load(id).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_session_record_roundtrip_keeps_values() {
        let now = Utc::now();
        let mut session = Session::new("s", now);
        session.values.insert("count".to_string(), json!(3));

        let decoded = Session::from_record(session.to_record(now).unwrap()).unwrap();
        assert_eq!(decoded.get("count"), Some(&json!(3)));
    }

    #[test]
    fn test_session_from_record_with_bad_data() {
        let mut record = SessionRecord::empty("s", Utc::now());
        record.data = "[1,2".to_string();
        assert!(matches!(
            Session::from_record(record),
            Err(CacheError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let store = Arc::new(MemoryStore::new());
        let result = SessionManager::new(store, 10, Duration::from_secs(60), Duration::ZERO);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_unrepresentable_default_ttl_rejected() {
        let store = Arc::new(MemoryStore::new());
        let result = SessionManager::new(
            store,
            10,
            Duration::from_secs(60),
            Duration::from_secs(10_000_000_000_000),
        );
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_set_value_with_huge_ttl_is_an_error() {
        let (manager, store) = manager(10);

        let result = manager
            .set_value(
                "s",
                "k",
                json!(1),
                Some(Duration::from_secs(10_000_000_000_000)),
            )
            .await;
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));

        // The session itself is untouched and still usable.
        let session = manager.get_session("s").await.unwrap();
        assert!(session.get("k").is_none());
        manager
            .set_value("s", "k", json!(2), Some(Duration::MAX))
            .await
            .unwrap_err();
        manager.set_value("s", "k", json!(3), None).await.unwrap();
        manager.stop().await;
        assert_eq!(stored(&store, "s").get("k"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_created_and_saved() {
        let (manager, store) = manager(10);

        let session = manager.get_session("new").await.unwrap();

        assert!(session.values.is_empty());
        assert!(session.expires_at.is_some());
        assert!(store.load("new").unwrap().is_some());
        assert!(manager.cache().exists("new").await);
    }

    #[tokio::test]
    async fn test_cache_miss_loads_from_repository() {
        let (manager, store) = manager(10);
        let now = Utc::now();
        let mut record = SessionRecord::empty("known", now);
        record.data = r#"{"name":"ada"}"#.to_string();
        store.save(record).unwrap();

        let session = manager.get_session("known").await.unwrap();

        assert_eq!(session.get("name"), Some(&json!("ada")));
        assert_eq!(session.expires_at, None);
        assert_eq!(manager.cache().frequency("known").await, Some(0));
    }

    #[tokio::test]
    async fn test_expired_stored_session_starts_fresh() {
        let (manager, store) = manager(10);
        let now = Utc::now();
        let mut record = SessionRecord::empty("old", now);
        record.data = r#"{"stale":true}"#.to_string();
        record.expires_at = Some(now - chrono::Duration::minutes(5));
        store.save(record).unwrap();

        let session = manager.get_session("old").await.unwrap();

        assert!(session.values.is_empty());
        assert!(stored(&store, "old").values.is_empty());
    }

    #[tokio::test]
    async fn test_set_value_is_persisted_lazily() {
        let (manager, store) = manager(10);

        manager
            .set_value("s1", "count", json!(1), None)
            .await
            .unwrap();
        assert!(stored(&store, "s1").values.is_empty(), "not yet written back");

        manager.cache().sweep_now().await;
        assert_eq!(stored(&store, "s1").get("count"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_set_value_counts_up_from_cache() {
        let (manager, store) = manager(10);

        for _ in 0..3 {
            let session = manager.get_session("s").await.unwrap();
            let count = session.get("count").and_then(Value::as_i64).unwrap_or(0);
            manager
                .set_value("s", "count", json!(count + 1), None)
                .await
                .unwrap();
        }
        manager.stop().await;

        assert_eq!(stored(&store, "s").get("count"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_remove_value() {
        let (manager, _store) = manager(10);

        manager.set_value("s", "a", json!(1), None).await.unwrap();
        manager.set_value("s", "b", json!(2), None).await.unwrap();
        let session = manager.remove_value("s", "a").await.unwrap();

        assert!(session.get("a").is_none());
        assert_eq!(session.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_eviction_persists_session() {
        let (manager, store) = manager(1);

        manager.set_value("a", "k", json!("v"), None).await.unwrap();
        manager.get_session("b").await.unwrap();

        assert!(!manager.cache().exists("a").await);
        assert_eq!(stored(&store, "a").get("k"), Some(&json!("v")));
    }

    /// Blocks the first save of `gated` until released.
    struct GatedStore {
        inner: MemoryStore,
        gated: &'static str,
        gate: std::sync::Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl SessionRepository for GatedStore {
        fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
            self.inner.load(id)
        }

        fn save(&self, record: SessionRecord) -> Result<()> {
            if record.id == self.gated {
                let gate = self.gate.lock().unwrap().take();
                if let Some((started, release)) = gate {
                    started.send(()).unwrap();
                    release.recv().unwrap();
                }
            }
            self.inner.save(record)
        }

        fn delete(&self, id: &str) -> Result<bool> {
            self.inner.delete(id)
        }

        fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
            self.inner.delete_expired(now)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_miss_during_eviction_sees_evicted_changes() {
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            gated: "a",
            gate: std::sync::Mutex::new(None),
        });
        let manager =
            SessionManager::new(store.clone(), 1, Duration::from_secs(60), TTL).unwrap();
        manager.set_value("a", "k", json!("new"), None).await.unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *store.gate.lock().unwrap() = Some((started_tx, release_rx));

        let evicting = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_session("b").await })
        };
        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        let reader = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_session("a").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        release_tx.send(()).unwrap();

        let session = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(session.get("k"), Some(&json!("new")));
        evicting.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_delete_session_everywhere() {
        let (manager, store) = manager(10);

        manager.get_session("gone").await.unwrap();
        manager.delete_session("gone").await.unwrap();

        assert!(store.load("gone").unwrap().is_none());
        assert!(!manager.cache().exists("gone").await);
        // Deleting again is not an error for the manager.
        manager.delete_session("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_expired_removes_stale_sessions() {
        let (manager, store) = manager(10);
        let now = Utc::now();
        let mut record = SessionRecord::empty("stale", now);
        record.expires_at = Some(now - chrono::Duration::seconds(1));
        store.save(record).unwrap();
        manager.get_session("live").await.unwrap();

        assert_eq!(manager.purge_expired().await.unwrap(), 1);
        assert!(store.load("stale").unwrap().is_none());
        assert!(store.load("live").unwrap().is_some());
    }
}
