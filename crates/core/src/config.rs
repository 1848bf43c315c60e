//! Collection configuration and builder
//!
//! A [`CollectionConfig`] is immutable once a collection has been built from
//! it. Durations are serialized as milliseconds so the same shape works in
//! TOML, JSON and environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smartcache_common::duration_millis;

use crate::error::{CacheError, CacheResult};

/// Capacity applied when a configuration leaves it unset (or sets it to 0)
pub const DEFAULT_CAPACITY: usize = 100;

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// Configuration for one named collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Unique collection name; also the prefix of composite external keys
    pub name: String,

    /// Maximum number of live entries before LRU eviction kicks in
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum entry age (`0` = entries never expire)
    #[serde(default, with = "duration_millis")]
    pub ttl: Duration,

    /// Period of the background sweep (`0` = no periodic sweep)
    #[serde(default, with = "duration_millis")]
    pub gc_interval: Duration,
}

impl CollectionConfig {
    /// Create a configuration with default capacity and no expiration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: DEFAULT_CAPACITY,
            ttl: Duration::ZERO,
            gc_interval: Duration::ZERO,
        }
    }

    /// Create a new configuration builder
    pub fn builder(name: impl Into<String>) -> CollectionConfigBuilder {
        CollectionConfigBuilder { config: Self::new(name) }
    }

    /// TTL as an option (`None` when entries never expire)
    pub fn expiry(&self) -> Option<Duration> {
        (!self.ttl.is_zero()).then_some(self.ttl)
    }

    /// Sweep period as an option (`None` when periodic sweeping is disabled)
    pub fn sweep_interval(&self) -> Option<Duration> {
        (!self.gc_interval.is_zero()).then_some(self.gc_interval)
    }

    /// Validate the configuration and apply defaults
    ///
    /// # Errors
    /// Returns [`CacheError::Configuration`] if the name is empty.
    pub fn normalized(mut self) -> CacheResult<Self> {
        if self.name.trim().is_empty() {
            return Err(CacheError::configuration_field("name", "collection name must not be empty"));
        }
        if self.capacity == 0 {
            self.capacity = DEFAULT_CAPACITY;
        }
        Ok(self)
    }
}

/// Builder for CollectionConfig with fluent API
#[derive(Debug, Clone)]
pub struct CollectionConfigBuilder {
    config: CollectionConfig,
}

impl CollectionConfigBuilder {
    /// Set maximum number of entries
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set time-to-live for entries
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Set the background sweep period
    pub fn gc_interval(mut self, interval: Duration) -> Self {
        self.config.gc_interval = interval;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CollectionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = CollectionConfig::new("users");
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.expiry(), None);
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn test_builder_sets_every_field() {
        let config = CollectionConfig::builder("col2")
            .capacity(10)
            .ttl(Duration::from_secs(2))
            .gc_interval(Duration::from_secs(5))
            .build();

        assert_eq!(config.name, "col2");
        assert_eq!(config.capacity, 10);
        assert_eq!(config.expiry(), Some(Duration::from_secs(2)));
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_normalized_rejects_empty_name() {
        let err = CollectionConfig::new("  ").normalized().unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn test_normalized_defaults_zero_capacity() {
        let config = CollectionConfig::builder("c").capacity(0).build().normalized().unwrap();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: CollectionConfig = serde_json::from_str(r#"{"name":"sessions"}"#).unwrap();
        assert_eq!(config, CollectionConfig::new("sessions"));
    }

    #[test]
    fn test_deserialize_durations_as_millis() {
        let config: CollectionConfig =
            serde_json::from_str(r#"{"name":"s","capacity":5,"ttl":2000,"gc_interval":500}"#)
                .unwrap();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.ttl, Duration::from_secs(2));
        assert_eq!(config.gc_interval, Duration::from_millis(500));
    }
}
