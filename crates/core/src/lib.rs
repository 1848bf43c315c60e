//! In-process named-collection cache with cache-aside fallbacks.
//!
//! The crate is organised leaves first:
//!
//! - [`collection`]: a single named, capacity-bounded key/value store with
//!   per-entry TTL, least-recently-used eviction, lazy expiration on read and
//!   an explicit (optionally periodic) garbage-collection sweep.
//! - [`engine`]: the registry mapping collection names to collections.
//! - [`session`]: a single-use cache-aside controller bound to one
//!   collection. It resolves misses through ordered fallback readers, mirrors
//!   writes to fallback writers and decodes the result into a typed output.
//!
//! # Example
//!
//! ```
//! use serde_json::{json, Value};
//! use smartcache_core::{CollectionConfig, Engine, SourceError};
//!
//! fn from_database(key: &str) -> Result<Option<Value>, SourceError> {
//!     assert_eq!(key, "users.42");
//!     Ok(Some(json!({ "id": 42, "name": "ada" })))
//! }
//!
//! # fn main() -> Result<(), smartcache_core::CacheError> {
//! let engine: Engine = Engine::start([CollectionConfig::builder("users").capacity(10).build()])?;
//!
//! let name: Value = engine.select("users").get("42", None, &[&from_database]).exec()?;
//! assert_eq!(name["name"], "ada");
//!
//! // The fallback result was stored; the second read is a plain hit.
//! let again: Value = engine.select("users").get("42", None, &[]).exec()?;
//! assert_eq!(again, name);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod stats;
pub mod value;

// Re-export public API
pub use collection::Collection;
pub use config::{CollectionConfig, CollectionConfigBuilder, DEFAULT_CAPACITY};
pub use engine::Engine;
pub use error::{CacheError, CacheResult, CollaboratorErrors, SourceError};
pub use session::{Getter, Outcome, Predicate, Session, Setter};
pub use stats::CacheStats;
pub use value::CacheValue;
