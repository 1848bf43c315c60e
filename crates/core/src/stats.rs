//! Collection statistics
//!
//! Counters are plain relaxed atomics; they never take the store lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of one collection's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries (may include expired, not yet swept entries)
    pub size: usize,

    /// Configured capacity
    pub capacity: usize,

    /// Reads that found a live entry
    pub hits: u64,

    /// Reads that found nothing or an expired entry
    pub misses: u64,

    /// Successful writes
    pub inserts: u64,

    /// Entries dropped to make room for a new key
    pub evictions: u64,

    /// Entries removed because they outlived the TTL (lazily or by a sweep)
    pub expirations: u64,

    /// Values fetched from a fallback and stored in the collection
    pub refills: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total reads)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate fill percentage (size / capacity)
    pub fn fill_percentage(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }
}

/// Thread-safe counters backing [`CacheStats`]
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    refills: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_refill(&self) {
        self.refills.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, size: usize, capacity: usize) -> CacheStats {
        CacheStats {
            size,
            capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
        }
    }
}
