//! Error types for the cache core

use std::fmt;
use std::time::Duration;

use smartcache_common::error::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

/// Error returned by external collaborators (fallback getters and setters)
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced by collections, the engine and sessions
#[derive(Debug, Error)]
pub enum CacheError {
    /// Missing or invalid collection configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// `select` was called with a name that was never registered
    #[error("Collection not found: '{name}'")]
    CollectionNotFound { name: String },

    /// The store refused a write
    #[error("Failed to write '{key}' to collection '{collection}': {reason}")]
    StoreWriteFailed { collection: String, key: String, reason: String },

    /// Delete of a key that is not present
    #[error("Failed to remove '{key}' from collection '{collection}': key not present")]
    StoreRemoveFailed { collection: String, key: String },

    /// The session finished without a pending result (a miss)
    #[error("No result to decode from collection '{collection}'")]
    NoResult { collection: String },

    /// The pending result does not fit the requested output shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// One or more fallback setters failed after the local write succeeded
    #[error(transparent)]
    Collaborators(#[from] CollaboratorErrors),
}

impl CacheError {
    pub(crate) fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub(crate) fn configuration_field<F: fmt::Display, S: fmt::Display>(field: F, message: S) -> Self {
        Self::Configuration { message: format!("field '{field}': {message}") }
    }

    /// `true` when the error only reports that nothing was found
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NoResult { .. })
    }
}

impl ErrorClassification for CacheError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Collaborators(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoResult { .. } | Self::StoreRemoveFailed { .. } => ErrorSeverity::Info,
            Self::CollectionNotFound { .. } | Self::Collaborators(_) => ErrorSeverity::Warning,
            Self::Configuration { .. } | Self::StoreWriteFailed { .. } | Self::Decode(_) => {
                ErrorSeverity::Error
            }
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Every failure reported by the setters of one upsert or delete
#[derive(Debug)]
pub struct CollaboratorErrors {
    key: String,
    errors: Vec<SourceError>,
}

impl CollaboratorErrors {
    pub(crate) fn new(key: String, errors: Vec<SourceError>) -> Self {
        Self { key, errors }
    }

    /// Composite key the setters were called with
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Individual setter errors, in setter order
    pub fn errors(&self) -> &[SourceError] {
        &self.errors
    }

    /// Number of setters that failed
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false` for errors produced by a session
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for CollaboratorErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} setter(s) failed for '{}'", self.errors.len(), self.key)?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CollaboratorErrors {}
