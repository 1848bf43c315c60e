//! Named, capacity-bounded key/value collections
//!
//! A [`Collection`] combines three expiry mechanisms:
//!
//! - **LRU eviction**: inserting a new key into a full collection evicts
//!   exactly one entry, the least recently read or written.
//! - **Lazy expiration**: a read of an entry older than the TTL reports it as
//!   absent and removes it.
//! - **Sweeps**: [`Collection::gc_sweep`] removes every expired entry, and a
//!   nonzero `gc_interval` runs it periodically in the background for the
//!   lifetime of the collection.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use smartcache_core::{Collection, CollectionConfig};
//!
//! let config = CollectionConfig::builder("numbers")
//!     .capacity(2)
//!     .ttl(Duration::from_secs(60))
//!     .build();
//! let numbers: Collection<i64> = Collection::new(config).unwrap();
//!
//! numbers.upsert("a", 1).unwrap();
//! numbers.upsert("b", 2).unwrap();
//! let _ = numbers.get("a"); // "b" is now the least recently used
//! numbers.upsert("c", 3).unwrap();
//!
//! assert_eq!(numbers.get("b"), None);
//! assert_eq!(numbers.len(), 2);
//! ```

mod store;
mod sweeper;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use smartcache_common::time::{Clock, SystemClock};
use tracing::debug;

use self::store::Store;
use self::sweeper::Sweeper;
use crate::config::CollectionConfig;
use crate::error::{CacheError, CacheResult};
use crate::stats::CacheStats;
use crate::value::CacheValue;

/// A single named key/value store with TTL and LRU eviction
///
/// All operations take `&self` and are safe to call from many threads at
/// once. Each primitive is atomic on its own; compound sequences (check then
/// write) are not.
pub struct Collection<V, C = SystemClock>
where
    V: CacheValue,
    C: Clock,
{
    config: CollectionConfig,
    store: Arc<Store<V, C>>,
    sweeper: Option<Sweeper>,
}

impl<V> Collection<V, SystemClock>
where
    V: CacheValue,
{
    /// Build a collection using the system clock
    ///
    /// # Errors
    /// Returns [`CacheError::Configuration`] for an invalid configuration or
    /// if the background sweep cannot be started.
    pub fn new(config: CollectionConfig) -> CacheResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<V, C> Collection<V, C>
where
    V: CacheValue,
    C: Clock,
{
    /// Build a collection with a custom clock (useful for testing)
    ///
    /// # Errors
    /// Returns [`CacheError::Configuration`] for an invalid configuration or
    /// if the background sweep cannot be started.
    pub fn with_clock(config: CollectionConfig, clock: C) -> CacheResult<Self> {
        let config = config.normalized()?;
        let capacity = NonZeroUsize::new(config.capacity)
            .ok_or_else(|| CacheError::configuration_field("capacity", "must be at least 1"))?;

        let store = Arc::new(Store::new(config.name.clone(), capacity, config.expiry(), clock));

        let sweeper = match (config.sweep_interval(), config.expiry()) {
            (Some(interval), Some(_)) => {
                Some(Sweeper::spawn(&config.name, Arc::downgrade(&store), interval)?)
            }
            (Some(_), None) => {
                debug!(collection = %config.name, "entries never expire, background sweep skipped");
                None
            }
            (None, _) => None,
        };

        Ok(Self { config, store, sweeper })
    }

    /// Collection name (the key label used in composite keys)
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The normalized configuration this collection was built from
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Entry time-to-live, `None` if entries never expire
    pub fn ttl(&self) -> Option<Duration> {
        self.config.expiry()
    }

    /// Key under which external collaborators see `key`: `"<name>.<key>"`
    pub fn composite_key(&self, key: &str) -> String {
        format!("{}.{}", self.config.name, key)
    }

    /// Insert or overwrite `key`, resetting its age to zero
    ///
    /// Inserting a new key into a full collection evicts the least recently
    /// used entry first.
    ///
    /// # Errors
    /// Returns [`CacheError::StoreWriteFailed`] if `key` is empty.
    pub fn upsert(&self, key: impl Into<String>, value: V) -> CacheResult<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::StoreWriteFailed {
                collection: self.config.name.clone(),
                key,
                reason: "key must not be empty".to_string(),
            });
        }
        self.store.insert(key, value);
        Ok(())
    }

    /// Upsert every pair independently, returning how many succeeded
    pub fn upsert_many<I, K>(&self, pairs: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        let mut written = 0;
        for (key, value) in pairs {
            match self.upsert(key, value) {
                Ok(()) => written += 1,
                Err(err) => debug!(collection = %self.config.name, error = %err, "skipped pair"),
            }
        }
        written
    }

    /// Live value for `key`
    ///
    /// Returns `None` if the key is missing or expired; an expired entry is
    /// removed as a side effect. A hit refreshes the entry's recency.
    pub fn get(&self, key: &str) -> Option<V> {
        self.store.get(key)
    }

    /// Whether a live entry exists for `key`
    ///
    /// Same lazy expiration as [`get`](Self::get), but does not count as an
    /// access for LRU purposes.
    pub fn exists(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Remove `key`
    ///
    /// # Errors
    /// Returns [`CacheError::StoreRemoveFailed`] if the key was not present.
    pub fn delete(&self, key: &str) -> CacheResult<()> {
        match self.store.remove(key) {
            Some(_) => Ok(()),
            None => Err(CacheError::StoreRemoveFailed {
                collection: self.config.name.clone(),
                key: key.to_string(),
            }),
        }
    }

    /// Visit every element of the sequence stored under `key`, in order
    ///
    /// Missing, expired and non-sequence values are silently skipped. The
    /// store lock is not held while `visit` runs.
    pub fn iterate<F>(&self, key: &str, mut visit: F)
    where
        F: FnMut(&V::Item, usize),
    {
        let Some(value) = self.store.get(key) else {
            return;
        };
        if let Some(items) = value.items() {
            for (index, item) in items.iter().enumerate() {
                visit(item, index);
            }
        }
    }

    /// Number of entries currently held, including expired entries that have
    /// not been read or swept yet
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the collection holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry, returning how many were removed
    pub fn gc_sweep(&self) -> usize {
        let removed = self.store.sweep();
        debug!(collection = %self.config.name, removed, "gc sweep finished");
        removed
    }

    /// Whether a background sweep is active for this collection
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(Sweeper::is_running)
    }

    /// Snapshot of this collection's counters
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub(crate) fn record_refill(&self) {
        self.store.record_refill();
    }
}

impl<V, C> fmt::Debug for Collection<V, C>
where
    V: CacheValue,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.config.name)
            .field("len", &self.len())
            .field("capacity", &self.config.capacity)
            .field("ttl", &self.config.ttl)
            .field("sweeping", &self.is_sweeping())
            .finish()
    }
}
