//! Registry of named collections
//!
//! The engine owns every [`Collection`] behind a `parking_lot::RwLock`:
//! registration takes the write lock, lookups take the read lock and hand out
//! an `Arc` so a session keeps its collection alive even if the name is later
//! re-registered.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use smartcache_common::time::{Clock, SystemClock};
use tracing::info;

use crate::collection::Collection;
use crate::config::CollectionConfig;
use crate::error::{CacheError, CacheResult};
use crate::session::Session;
use crate::stats::CacheStats;
use crate::value::CacheValue;

struct Registry<V, C>
where
    V: CacheValue,
    C: Clock,
{
    collections: HashMap<String, Arc<Collection<V, C>>>,
    configs: HashMap<String, CollectionConfig>,
}

impl<V, C> Default for Registry<V, C>
where
    V: CacheValue,
    C: Clock,
{
    fn default() -> Self {
        Self { collections: HashMap::new(), configs: HashMap::new() }
    }
}

/// Name → collection registry and entry point for sessions
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use smartcache_core::{CollectionConfig, Engine};
///
/// let engine: Engine<i64> = Engine::start([
///     CollectionConfig::builder("counters").ttl(Duration::from_secs(30)).build(),
/// ])
/// .unwrap();
///
/// engine.select("counters").upsert("visits", 1, &[]).unwrap();
/// assert_eq!(engine.select("counters").get("visits", None, &[]).exec::<i64>().unwrap(), 1);
/// assert!(engine.select("missing").error().is_some());
/// ```
pub struct Engine<V = Value, C = SystemClock>
where
    V: CacheValue,
    C: Clock + Clone,
{
    registry: RwLock<Registry<V, C>>,
    clock: C,
}

impl<V> Engine<V, SystemClock>
where
    V: CacheValue,
{
    /// Build an engine with one collection per configuration
    ///
    /// Every configuration is validated before any collection is created, so
    /// a single invalid entry fails the whole engine.
    ///
    /// # Errors
    /// Returns [`CacheError::Configuration`] if any configuration is invalid
    /// or a background sweep cannot be started.
    pub fn start<I>(configs: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = CollectionConfig>,
    {
        Self::with_clock(SystemClock, configs)
    }
}

impl<V, C> Engine<V, C>
where
    V: CacheValue,
    C: Clock + Clone,
{
    /// Build an engine whose collections all read time from `clock`
    ///
    /// # Errors
    /// Same as [`Engine::start`].
    pub fn with_clock<I>(clock: C, configs: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = CollectionConfig>,
    {
        let engine = Self { registry: RwLock::new(Registry::default()), clock };
        engine.register(configs)?;
        Ok(engine)
    }

    /// Install collections, replacing any existing collection with the same
    /// name
    ///
    /// Nothing is installed unless every configuration is valid. Sessions
    /// already bound to a replaced collection keep using it.
    ///
    /// # Errors
    /// Returns [`CacheError::Configuration`] if any configuration is invalid
    /// or a background sweep cannot be started.
    pub fn register<I>(&self, configs: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = CollectionConfig>,
    {
        let configs = configs
            .into_iter()
            .map(CollectionConfig::normalized)
            .collect::<CacheResult<Vec<_>>>()?;

        let mut built = Vec::with_capacity(configs.len());
        for config in configs {
            let collection = Collection::with_clock(config.clone(), self.clock.clone())?;
            built.push((config, Arc::new(collection)));
        }

        let mut registry = self.registry.write();
        for (config, collection) in built {
            let name = config.name.clone();
            let replaced = registry.collections.insert(name.clone(), collection).is_some();
            registry.configs.insert(name.clone(), config.clone());

            info!(
                collection = %name,
                capacity = config.capacity,
                ttl_ms = config.ttl.as_millis() as u64,
                gc_interval_ms = config.gc_interval.as_millis() as u64,
                replaced,
                "registered collection"
            );
        }
        Ok(())
    }

    /// Start a session bound to the named collection
    ///
    /// An unknown name does not fail here: the returned session carries
    /// [`CacheError::CollectionNotFound`] and reports it when finalized.
    pub fn select(&self, name: &str) -> Session<V, C> {
        match self.registry.read().collections.get(name) {
            Some(collection) => Session::bound(Arc::clone(collection)),
            None => Session::failed(CacheError::CollectionNotFound { name: name.to_string() }),
        }
    }

    /// The named collection, if registered
    pub fn collection(&self, name: &str) -> Option<Arc<Collection<V, C>>> {
        self.registry.read().collections.get(name).cloned()
    }

    /// Snapshot of every registered collection
    pub fn collections(&self) -> HashMap<String, Arc<Collection<V, C>>> {
        self.registry.read().collections.clone()
    }

    /// Snapshot of every registered configuration (normalized)
    pub fn configs(&self) -> HashMap<String, CollectionConfig> {
        self.registry.read().configs.clone()
    }

    /// Number of registered collections
    pub fn len(&self) -> usize {
        self.registry.read().collections.len()
    }

    /// Whether no collection is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters for every collection, keyed by name
    pub fn stats(&self) -> BTreeMap<String, CacheStats> {
        self.registry
            .read()
            .collections
            .iter()
            .map(|(name, collection)| (name.clone(), collection.stats()))
            .collect()
    }

    /// Log every collection with its configuration and counters
    pub fn info(&self) {
        let collections: BTreeMap<String, Arc<Collection<V, C>>> =
            self.registry.read().collections.clone().into_iter().collect();

        info!(count = collections.len(), "registered collections");
        for (name, collection) in collections {
            let stats = collection.stats();
            info!(
                collection = %name,
                size = stats.size,
                capacity = stats.capacity,
                ttl_ms = collection.config().ttl.as_millis() as u64,
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                expirations = stats.expirations,
                sweeping = collection.is_sweeping(),
                "collection"
            );
        }
    }
}

impl<V, C> fmt::Debug for Engine<V, C>
where
    V: CacheValue,
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        let mut names: Vec<&String> = registry.collections.keys().collect();
        names.sort();
        f.debug_struct("Engine").field("collections", &names).finish()
    }
}
