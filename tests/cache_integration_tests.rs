//! Integration Tests for the Write-back Cache
//!
//! Exercises the public `Cache` handle end to end: capacity, recency, expiry,
//! frequency flushing, eviction write-back, delete and shutdown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use writeback_cache::{Cache, CacheError};

// == Helper Functions ==

type Flushes = Arc<Mutex<Vec<(String, String, u64)>>>;

fn recording_cache(capacity: usize) -> (Cache<String>, Flushes) {
    let flushes: Flushes = Arc::default();
    let sink = Arc::clone(&flushes);
    let cache = Cache::new(capacity, move |key: &str, value: &String, frequency: u64| {
        sink.lock()
            .unwrap()
            .push((key.to_string(), value.clone(), frequency));
    })
    .unwrap();
    (cache, flushes)
}

fn flushed(flushes: &Flushes) -> Vec<(String, String, u64)> {
    flushes.lock().unwrap().clone()
}

fn triple(key: &str, value: &str, frequency: u64) -> (String, String, u64) {
    (key.to_string(), value.to_string(), frequency)
}

// == Capacity ==

#[tokio::test]
async fn test_capacity_two_keeps_last_two_keys() {
    let (cache, _flushes) = recording_cache(2);

    for key in ["a", "b", "c"] {
        cache.set(key, key.to_uppercase(), None).await;
        assert!(cache.len().await <= 2);
    }

    assert!(!cache.exists("a").await);
    assert!(cache.exists("b").await);
    assert!(cache.exists("c").await);
}

#[tokio::test]
async fn test_zero_capacity_fails_fast() {
    let result = Cache::<String>::new(0, |_: &str, _: &String, _: u64| {});
    assert!(matches!(result, Err(CacheError::InvalidCapacity(0))));
}

// == LRU Order ==

#[tokio::test]
async fn test_get_protects_key_from_eviction() {
    let (cache, _flushes) = recording_cache(2);

    cache.set("a", "1".to_string(), None).await;
    cache.set("b", "2".to_string(), None).await;
    cache.get("a").await;
    cache.set("c", "3".to_string(), None).await;

    assert!(cache.exists("a").await);
    assert!(!cache.exists("b").await);
    assert!(cache.exists("c").await);
}

// == TTL Expiry ==

#[tokio::test(start_paused = true)]
async fn test_expired_entry_flushed_once_then_absent() {
    let (cache, flushes) = recording_cache(10);

    cache
        .set("k", "v".to_string(), Some(Duration::from_millis(1)))
        .await;
    assert_eq!(cache.get("k").await, Some("v".to_string()));

    tokio::time::sleep(Duration::from_millis(5)).await;

    // Logically absent before the sweep, still physically resident.
    assert_eq!(cache.get("k").await, None);
    assert!(cache.exists("k").await);

    let report = cache.sweep_now().await;
    assert_eq!(report.expired, 1);
    assert_eq!(cache.get("k").await, None);
    assert!(!cache.exists("k").await);
    assert_eq!(flushed(&flushes), vec![triple("k", "v", 1)]);

    cache.sweep_now().await;
    assert_eq!(flushed(&flushes).len(), 1);
}

// == Frequency Accounting ==

#[tokio::test]
async fn test_sweep_reports_frequency_without_evicting() {
    let (cache, flushes) = recording_cache(10);

    cache.set("k", "v".to_string(), None).await;
    for _ in 0..3 {
        cache.get("k").await;
    }

    let report = cache.sweep_now().await;
    assert_eq!(report.flushed, 1);
    assert_eq!(flushed(&flushes), vec![triple("k", "v", 3)]);
    assert_eq!(cache.frequency("k").await, Some(0));

    assert_eq!(cache.get("k").await, Some("v".to_string()));
    assert_eq!(cache.frequency("k").await, Some(1));
}

#[tokio::test]
async fn test_overwrite_preserves_frequency() {
    let (cache, flushes) = recording_cache(10);

    cache.set("k", "old".to_string(), None).await;
    cache.get("k").await;
    cache.get("k").await;
    cache.set("k", "new".to_string(), None).await;
    cache.sweep_now().await;

    assert_eq!(flushed(&flushes), vec![triple("k", "new", 2)]);
}

// == Eviction Write-back ==

#[tokio::test]
async fn test_eviction_flushes_evicted_entry() {
    let (cache, flushes) = recording_cache(1);

    cache.set("a", "x".to_string(), None).await;
    cache.set("b", "y".to_string(), None).await;

    assert_eq!(flushed(&flushes), vec![triple("a", "x", 0)]);
    assert_eq!(cache.stats().await.evictions, 1);
}

// == Delete ==

#[tokio::test]
async fn test_delete_missing_key_reports_not_found() {
    let (cache, flushes) = recording_cache(10);
    cache.set("keep", "v".to_string(), None).await;

    let result = cache.delete("missing").await;
    assert!(matches!(result, Err(CacheError::NotFound(ref k)) if k == "missing"));

    assert_eq!(cache.get("keep").await, Some("v".to_string()));
    cache.delete("keep").await.unwrap();
    assert!(matches!(
        cache.delete("keep").await,
        Err(CacheError::NotFound(_))
    ));
    assert!(flushed(&flushes).is_empty());
}

// == Shutdown ==

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_once_and_halts_sweeps() {
    let (cache, flushes) = recording_cache(10);

    cache.set("hot", "h".to_string(), None).await;
    cache.set("cold", "c".to_string(), None).await;
    cache
        .set("stale", "s".to_string(), Some(Duration::from_millis(1)))
        .await;
    cache.get("hot").await;
    cache.get("hot").await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    cache.stop().await;

    let mut after_stop = flushed(&flushes);
    after_stop.sort();
    assert_eq!(after_stop, vec![triple("hot", "h", 2), triple("stale", "s", 0)]);
    assert!(!cache.is_running());

    // Still a working bounded cache, but nothing sweeps any more.
    cache.get("hot").await;
    cache.set("new", "n".to_string(), None).await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(flushed(&flushes).len(), 2);
    assert_eq!(cache.frequency("hot").await, Some(1));
    assert_eq!(cache.get("new").await, Some("n".to_string()));

    cache.stop().await;
    assert_eq!(flushed(&flushes).len(), 2);
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access_keeps_invariants() {
    let (cache, flushes) = recording_cache(16);

    let tasks: Vec<_> = (0..8)
        .map(|worker| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let key = format!("k{}", (worker * 7 + i) % 32);
                    if i % 3 == 0 {
                        cache.set(key, format!("w{worker}"), None).await;
                    } else {
                        cache.get(&key).await;
                    }
                    if i % 50 == 0 {
                        cache.sweep_now().await;
                    }
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let stats = cache.stats().await;
    assert!(stats.total_entries <= 16);
    assert_eq!(cache.keys().await.len(), stats.total_entries);

    cache.stop().await;
    let reported: u64 = flushed(&flushes).iter().map(|(_, _, f)| f).sum();
    assert_eq!(reported, stats.hits);
}
