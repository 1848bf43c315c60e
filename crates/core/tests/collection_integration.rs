//! Integration tests for collections: TTL, LRU eviction and background sweeps

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use smartcache_common::time::MockClock;
use smartcache_core::{Collection, CollectionConfig};

fn mock_collection(capacity: usize, ttl: Duration) -> (Collection<Value, MockClock>, MockClock) {
    let clock = MockClock::new();
    let config = CollectionConfig::builder("col1").capacity(capacity).ttl(ttl).build();
    let collection =
        Collection::with_clock(config, clock.clone()).expect("collection should be created");
    (collection, clock)
}

/// Validates `Collection::get` behavior for the capacity 10, TTL 2s scenario.
///
/// Assertions:
/// - A fresh entry is returned
/// - After 3s the entry is neither returned nor reported as existing
#[test]
fn test_capacity_ten_ttl_two_seconds_scenario() {
    let (col, clock) = mock_collection(10, Duration::from_secs(2));

    col.upsert("a", json!(1)).unwrap();
    assert_eq!(col.get("a"), Some(json!(1)));

    clock.advance(Duration::from_secs(3));

    assert_eq!(col.get("a"), None);
    assert!(!col.exists("a"));
}

/// Validates LRU eviction when one key more than the capacity is written.
///
/// Assertions:
/// - Size stays at capacity
/// - Only the least recently used key is evicted
#[test]
fn test_capacity_plus_one_distinct_keys_evicts_exactly_one() {
    let (col, _) = mock_collection(10, Duration::ZERO);

    for i in 0..10 {
        col.upsert(format!("k{i}"), json!(i)).unwrap();
    }
    // Touch everything except k3 so it becomes the least recently used.
    for i in (0..10).filter(|i| *i != 3) {
        assert!(col.get(&format!("k{i}")).is_some());
    }
    col.upsert("k10", json!(10)).unwrap();

    assert_eq!(col.len(), 10);
    assert!(!col.exists("k3"));
    assert_eq!(col.stats().evictions, 1);
}

/// Validates `Collection::gc_sweep` behavior for mixed-age entries.
#[test]
fn test_sweep_removes_only_expired_entries() {
    let (col, clock) = mock_collection(10, Duration::from_secs(5));
    col.upsert("old1", json!(1)).unwrap();
    col.upsert("old2", json!(2)).unwrap();
    clock.advance(Duration::from_secs(4));
    col.upsert("young", json!(3)).unwrap();
    clock.advance(Duration::from_secs(2));

    assert_eq!(col.gc_sweep(), 2);
    assert_eq!(col.gc_sweep(), 0);
    assert_eq!(col.get("young"), Some(json!(3)));

    let stats = col.stats();
    assert_eq!(stats.expirations, 2);
    assert_eq!(stats.size, 1);
}

/// Validates racing lazy expiration and sweeps over one expired entry.
///
/// Assertions:
/// - Every reader sees a miss
/// - The entry is counted as expired exactly once
#[test]
fn test_concurrent_reads_of_expired_entry_are_harmless() {
    let (col, clock) = mock_collection(10, Duration::from_millis(10));
    let col = Arc::new(col);
    col.upsert("k", json!("v")).unwrap();
    clock.advance(Duration::from_millis(20));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let col = Arc::clone(&col);
            thread::spawn(move || {
                if i % 2 == 0 {
                    col.get("k")
                } else {
                    col.gc_sweep();
                    None
                }
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), None);
    }
    assert!(col.is_empty());
    assert_eq!(col.stats().expirations, 1);
}

#[test]
fn test_concurrent_writers_respect_capacity() {
    let (col, _) = mock_collection(16, Duration::ZERO);
    let col = Arc::new(col);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let col = Arc::clone(&col);
            thread::spawn(move || {
                for i in 0..50 {
                    col.upsert(format!("t{t}-{i}"), json!(i)).unwrap();
                    let _ = col.get(&format!("t{t}-{i}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = col.stats();
    assert_eq!(stats.size, 16);
    assert_eq!(stats.inserts, 200);
    assert_eq!(stats.evictions, 200 - 16);
}

/// Validates the background sweep as a task on the ambient tokio runtime.
#[tokio::test]
async fn test_background_sweep_recurs_on_runtime() {
    let config = CollectionConfig::builder("gc")
        .ttl(Duration::from_millis(30))
        .gc_interval(Duration::from_millis(20))
        .build();
    let col: Collection<Value> = Collection::new(config).unwrap();
    assert!(col.is_sweeping());

    col.upsert("first", json!(1)).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(col.len(), 0, "first entry should be swept");

    // A second round proves the sweep keeps firing.
    col.upsert("second", json!(2)).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(col.len(), 0, "second entry should be swept");
    assert!(col.stats().expirations >= 2);
}

/// Validates the background sweep on its own thread when no runtime is
/// current.
#[test]
fn test_background_sweep_without_runtime_uses_thread() {
    let config = CollectionConfig::builder("gc-thread")
        .ttl(Duration::from_millis(30))
        .gc_interval(Duration::from_millis(20))
        .build();
    let col: Collection<i64> = Collection::new(config).unwrap();
    assert!(col.is_sweeping());

    col.upsert("a", 1).unwrap();
    col.upsert("b", 2).unwrap();
    thread::sleep(Duration::from_millis(200));

    assert!(col.is_empty());
}
