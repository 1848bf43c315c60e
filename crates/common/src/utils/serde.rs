//! Serialization utilities for configuration types
//!
//! Durations in SmartCache configuration files are plain integers counted in
//! milliseconds (`ttl = 2000`), which keeps TOML, JSON and environment
//! variables consistent with each other.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde adapter storing a `Duration` as whole milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use serde::{Deserialize, Serialize};
/// use smartcache_common::duration_millis;
///
/// #[derive(Serialize, Deserialize)]
/// struct Sweep {
///     #[serde(with = "duration_millis")]
///     interval: Duration,
/// }
///
/// let sweep: Sweep = serde_json::from_str(r#"{"interval":1500}"#).unwrap();
/// assert_eq!(sweep.interval, Duration::from_millis(1500));
/// ```
pub mod duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    /// Serde serialization result type
    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as milliseconds (u64), saturating at `u64::MAX`
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
