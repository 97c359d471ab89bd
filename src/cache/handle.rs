//! Cache Handle Module
//!
//! Thread-safe, cloneable front end over [`CacheStore`]. Owns the store lock, the
//! write-back hook and the lifecycle of the maintenance sweeper.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{
    CacheStats, CacheStore, FlushReason, FlushRecord, SweepReport, WriteBack,
    DEFAULT_SWEEP_INTERVAL,
};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweeper;

// == Shared State ==
/// State shared between every handle and the sweeper task.
pub(crate) struct Shared<V> {
    store: Mutex<CacheStore<V>>,
    writeback: Box<dyn WriteBack<V>>,
    /// Keys already removed from the store whose write-back has not returned yet
    in_flight: StdMutex<HashMap<String, usize>>,
    settled: Notify,
    running: AtomicBool,
}

impl<V> Shared<V> {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_stopped(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl<V: Clone + Send + 'static> Shared<V> {
    /// One maintenance pass. The lock is released before any record is written back.
    pub(crate) async fn run_sweep(&self) -> SweepReport {
        let (records, report) = {
            let mut store = self.store.lock().await;
            let (records, report) = store.sweep(Instant::now());
            self.begin_write_back(&records);
            (records, report)
        };

        self.deliver(records);
        report
    }

    /// Marks removed keys as pending. Must run under the store lock, so a lookup that
    /// misses afterwards can see the key is still on its way to the backing store.
    fn begin_write_back<'a>(&self, records: impl IntoIterator<Item = &'a FlushRecord<V>>)
    where
        V: 'a,
    {
        let mut pending = self.in_flight();
        for record in records.into_iter().filter(|r| r.reason != FlushReason::Frequency) {
            *pending.entry(record.key.clone()).or_default() += 1;
        }
    }

    fn deliver(&self, records: impl IntoIterator<Item = FlushRecord<V>>) {
        for record in records {
            let removed = record.reason != FlushReason::Frequency;
            let key = removed.then(|| record.key.clone());
            record.deliver(self.writeback.as_ref());

            if let Some(key) = key {
                let mut pending = self.in_flight();
                if let Some(count) = pending.get_mut(&key) {
                    *count -= 1;
                    if *count == 0 {
                        pending.remove(&key);
                    }
                }
                drop(pending);
                self.settled.notify_waiters();
            }
        }
    }
}

struct Lifecycle {
    stop_tx: Option<oneshot::Sender<()>>,
    sweeper: Option<JoinHandle<()>>,
}

// == Cache ==
/// Bounded write-back cache with TTL expiry, LRU eviction and frequency flushing.
///
/// Cloning yields another handle to the same cache. When the last handle is dropped
/// without [`Cache::stop`], the sweeper still runs its final pass before exiting.
///
/// Must be created inside a tokio runtime, since construction spawns the sweeper.
pub struct Cache<V> {
    shared: Arc<Shared<V>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

impl<V: Clone + Send + 'static> Cache<V> {
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries with the default sweep interval.
    pub fn new<W>(capacity: usize, writeback: W) -> Result<Self>
    where
        W: WriteBack<V> + 'static,
    {
        Self::with_interval(capacity, DEFAULT_SWEEP_INTERVAL, writeback)
    }

    /// Creates a cache whose sweeper wakes every `interval`.
    ///
    /// Fails on a zero capacity or a zero interval.
    pub fn with_interval<W>(capacity: usize, interval: Duration, writeback: W) -> Result<Self>
    where
        W: WriteBack<V> + 'static,
    {
        if interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }

        let shared = Arc::new(Shared {
            store: Mutex::new(CacheStore::new(capacity)?),
            writeback: Box::new(writeback),
            in_flight: StdMutex::new(HashMap::new()),
            settled: Notify::new(),
            running: AtomicBool::new(true),
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let sweeper = spawn_sweeper(Arc::clone(&shared), interval, stop_rx);

        Ok(Self {
            shared,
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                stop_tx: Some(stop_tx),
                sweeper: Some(sweeper),
            })),
        })
    }

    // == Get ==
    /// Returns a clone of the value if present and not expired.
    ///
    /// Counts as an access: bumps the frequency and moves the key to the front.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.shared.store.lock().await.get(key, Instant::now())
    }

    // == Set ==
    /// Stores a value. `None` or a zero `ttl` means no expiry.
    ///
    /// If a new key displaces the least recently used entry, the displaced entry is
    /// written back before this call returns.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let evicted = {
            let mut store = self.shared.store.lock().await;
            let evicted = store.set(key.into(), value, ttl, Instant::now());
            self.shared.begin_write_back(evicted.iter());
            evicted
        };

        self.shared.deliver(evicted);
    }

    // == Delete ==
    /// Removes a key. Fails with [`CacheError::NotFound`] if it is not resident.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.shared.store.lock().await.delete(key)
    }

    // == Exists ==
    /// True if the key is resident, even when its TTL has already elapsed.
    pub async fn exists(&self, key: &str) -> bool {
        self.shared.store.lock().await.exists(key)
    }

    /// Current frequency counter of a resident key, without counting as an access.
    pub async fn frequency(&self, key: &str) -> Option<u64> {
        self.shared
            .store
            .lock()
            .await
            .peek(key)
            .map(|entry| entry.frequency)
    }

    // == Write-back Settled ==
    /// Waits until no eviction or expiry write-back is pending for `key`.
    ///
    /// An entry leaves the store before its write-back runs. Awaiting this before reloading
    /// a missed key from the backing store guarantees the reload sees the written value.
    /// Must not be awaited from the write-back hook for the key it is writing.
    pub async fn write_back_settled(&self, key: &str) {
        loop {
            let notified = self.shared.settled.notified();
            if !self.shared.in_flight().contains_key(key) {
                return;
            }
            notified.await;
        }
    }

    // == Sweep Now ==
    /// Runs one maintenance pass immediately, outside the regular schedule.
    pub async fn sweep_now(&self) -> SweepReport {
        self.shared.run_sweep().await
    }

    // == Stop ==
    /// Stops the sweeper after one final pass and waits for it to finish.
    ///
    /// Calling it again is a no-op that returns once the first call has finished. The cache
    /// keeps working as a plain bounded cache. The final pass invokes the write-back hook,
    /// so the hook must not wait on this call.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(stop_tx) = lifecycle.stop_tx.take() else {
            debug!("Cache sweeper already stopped");
            return;
        };
        self.shared.mark_stopped();

        // A send error means the sweeper already exited on its own.
        let _ = stop_tx.send(());

        if let Some(sweeper) = lifecycle.sweeper.take() {
            if let Err(err) = sweeper.await {
                warn!("Cache sweeper ended abnormally: {}", err);
            }
        }
    }

    /// True until [`Cache::stop`] has been called or the sweeper has exited.
    ///
    /// Never blocks, so the write-back hook may call it.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    // == Introspection ==
    pub async fn stats(&self) -> CacheStats {
        self.shared.store.lock().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.shared.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.store.lock().await.is_empty()
    }

    pub async fn capacity(&self) -> usize {
        self.shared.store.lock().await.capacity()
    }

    /// Keys from most to least recently used.
    pub async fn keys(&self) -> Vec<String> {
        self.shared.store.lock().await.keys()
    }
}
