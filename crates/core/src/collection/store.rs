//! LRU-ordered entry storage with age tracking
//!
//! Every primitive takes the store mutex exactly once and releases it before
//! returning. Expired-entry removal is idempotent: whichever caller gets the
//! lock first removes the entry, later callers find nothing to remove.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use smartcache_common::time::Clock;
use tracing::{debug, trace};

use crate::stats::{CacheStats, MetricsCollector};
use crate::value::CacheValue;

/// A stored value and the instant it was last written
#[derive(Debug, Clone)]
struct Entry<V> {
    created_at: Instant,
    value: V,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| now.saturating_duration_since(self.created_at) > ttl)
    }
}

pub(crate) struct Store<V, C> {
    collection: String,
    entries: Mutex<LruCache<String, Entry<V>>>,
    ttl: Option<Duration>,
    clock: C,
    metrics: MetricsCollector,
}

impl<V, C> Store<V, C>
where
    V: CacheValue,
    C: Clock,
{
    pub(crate) fn new(
        collection: String,
        capacity: NonZeroUsize,
        ttl: Option<Duration>,
        clock: C,
    ) -> Self {
        Self {
            collection,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
            metrics: MetricsCollector::default(),
        }
    }

    /// Insert or overwrite `key`, resetting its age. Evicts at most one entry.
    pub(crate) fn insert(&self, key: String, value: V) {
        let entry = Entry { created_at: self.clock.now(), value };
        let displaced = self.entries.lock().push(key.clone(), entry);
        self.metrics.record_insert();

        if let Some((displaced_key, _)) = displaced {
            if displaced_key != key {
                self.metrics.record_eviction();
                debug!(
                    collection = %self.collection,
                    evicted = %displaced_key,
                    "evicted least recently used entry"
                );
            }
        }
    }

    /// Live value for `key`, refreshing its recency. Expired entries are
    /// removed and reported as absent.
    pub(crate) fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(now, self.ttl),
            None => {
                self.metrics.record_miss();
                return None;
            }
        };

        if expired {
            entries.pop(key);
            drop(entries);
            self.metrics.record_miss();
            self.metrics.record_expirations(1);
            trace!(collection = %self.collection, key, "expired on read");
            return None;
        }

        let value = entries.get(key).map(|entry| entry.value.clone());
        drop(entries);
        if value.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
        value
    }

    /// Whether a live entry exists. Does not refresh recency.
    pub(crate) fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.peek(key).map(|entry| entry.is_expired(now, self.ttl)) {
            None => false,
            Some(false) => true,
            Some(true) => {
                entries.pop(key);
                drop(entries);
                self.metrics.record_expirations(1);
                false
            }
        }
    }

    pub(crate) fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().pop(key).map(|entry| entry.value)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Remove every entry older than the TTL, one entry per lock acquisition.
    ///
    /// Keys are collected in a read-only pass first; each removal re-checks
    /// the entry so a key rewritten in between is kept. That pass holds the
    /// store mutex for one walk over every entry, O(capacity), which bounds
    /// how long a concurrent read or write can wait on a sweep. Removals
    /// release the lock between keys.
    pub(crate) fn sweep(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let now = self.clock.now();
        let candidates: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in &candidates {
            let mut entries = self.entries.lock();
            if entries.peek(key).is_some_and(|entry| entry.is_expired(now, self.ttl)) {
                entries.pop(key);
                removed += 1;
            }
        }

        if removed > 0 {
            self.metrics.record_expirations(removed as u64);
        }
        removed
    }

    pub(crate) fn record_refill(&self) {
        self.metrics.record_refill();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let (size, capacity) = {
            let entries = self.entries.lock();
            (entries.len(), entries.cap().get())
        };
        self.metrics.snapshot(size, capacity)
    }
}

#[cfg(test)]
mod tests {
    use smartcache_common::time::MockClock;

    use super::*;

    fn store(capacity: usize, ttl: Option<Duration>) -> (Store<i64, MockClock>, MockClock) {
        let clock = MockClock::new();
        let capacity = NonZeroUsize::new(capacity).unwrap();
        (Store::new("test".into(), capacity, ttl, clock.clone()), clock)
    }

    #[test]
    fn test_entry_expiry_is_strict() {
        let (store, clock) = store(4, Some(Duration::from_secs(2)));
        store.insert("a".into(), 1);

        clock.advance(Duration::from_secs(2));
        assert_eq!(store.get("a"), Some(1), "age == ttl is still live");

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_replacing_a_key_is_not_an_eviction() {
        let (store, _) = store(1, None);
        store.insert("a".into(), 1);
        store.insert("a".into(), 2);

        let stats = store.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.inserts, 2);
        assert_eq!(store.get("a"), Some(2));
    }

    #[test]
    fn test_contains_removes_expired_without_touching_hits() {
        let (store, clock) = store(4, Some(Duration::from_secs(1)));
        store.insert("a".into(), 1);
        clock.advance(Duration::from_secs(5));

        assert!(!store.contains("a"));
        let stats = store.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[test]
    fn test_sweep_keeps_rewritten_entries() {
        let (store, clock) = store(8, Some(Duration::from_secs(10)));
        store.insert("old".into(), 1);
        clock.advance(Duration::from_secs(11));
        store.insert("fresh".into(), 2);

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.get("fresh"), Some(2));
        assert_eq!(store.sweep(), 0);
    }

    /// Validates `Store::sweep` behavior for the concurrent writers scenario.
    ///
    /// Assertions:
    /// - Every entry expired before the sweep started is removed
    /// - Every entry written while the sweep runs survives it
    #[test]
    fn test_sweep_runs_alongside_writers() {
        let (store, clock) = store(4096, Some(Duration::from_secs(1)));
        for i in 0..1000 {
            store.insert(format!("old-{i}"), i);
        }
        clock.advance(Duration::from_secs(2));

        let removed = std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for i in 0..1000 {
                    store.insert(format!("new-{i}"), i);
                }
            });
            let removed = store.sweep();
            writer.join().unwrap();
            removed
        });

        assert_eq!(removed, 1000);
        assert_eq!(store.len(), 1000);
        assert!((0..1000).all(|i| store.contains(&format!("new-{i}"))));
        assert_eq!(store.stats().expirations, 1000);
    }

    #[test]
    fn test_sweep_without_ttl_is_noop() {
        let (store, clock) = store(8, None);
        store.insert("a".into(), 1);
        clock.advance(Duration::from_secs(3600));

        assert_eq!(store.sweep(), 0);
        assert_eq!(store.len(), 1);
    }
}
