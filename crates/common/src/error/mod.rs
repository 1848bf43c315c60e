//! Common error types and classification for SmartCache crates
//!
//! Two pieces live here:
//!
//! 1. **`ErrorClassification`**: the interface every error type in the
//!    workspace implements so callers can decide whether to retry, how loudly
//!    to log, and whether to page someone.
//!
//! 2. **`CommonError`**: the error used by the outer layers (configuration
//!    loading, bootstrap). The cache core has its own `CacheError` and
//!    classifies it through the same trait.
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Cache miss, unknown collection |
//! | **Warning** | Degraded but operational | Fallback setter failed |
//! | **Error** | Failure requiring attention | Invalid config, decode failure |
//! | **Critical** | System integrity at risk | Internal invariant violations |
//!
//! ## Example
//!
//! ```rust
//! use smartcache_common::error::{CommonError, CommonResult, ErrorClassification};
//!
//! fn parse_capacity(raw: &str) -> CommonResult<usize> {
//!     raw.parse::<usize>()
//!         .map_err(|e| CommonError::config_field("capacity", e.to_string()))
//! }
//!
//! let err = parse_capacity("lots").unwrap_err();
//! assert!(!err.is_retryable());
//! ```

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Error variants shared by the outer layers of the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// File I/O errors
    Persistence { message: String, operation: Option<String> },

    /// Resource not found errors
    NotFound { resource_type: String, identifier: Option<String> },

    /// Internal errors that shouldn't normally occur
    Internal { message: String, context: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => {
                if let Some(field) = field {
                    write!(f, "Configuration error in field '{}': {}", field, message)
                } else {
                    write!(f, "Configuration error: {}", message)
                }
            }
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Persistence { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Persistence error during '{}': {}", op, message)
                } else {
                    write!(f, "Persistence error: {}", message)
                }
            }
            Self::NotFound { resource_type, identifier } => {
                if let Some(id) = identifier {
                    write!(f, "{} not found: '{}'", resource_type, id)
                } else {
                    write!(f, "{} not found", resource_type)
                }
            }
            Self::Internal { message, context } => {
                if let Some(ctx) = context {
                    write!(f, "Internal error in '{}': {}", ctx, message)
                } else {
                    write!(f, "Internal error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        // I/O can be transient; everything else needs a change before retrying
        matches!(self, Self::Persistence { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } | Self::Serialization { .. } | Self::Persistence { .. } => {
                ErrorSeverity::Error
            }
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error for a named format
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a simple persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Create a not-found error for a resource type
    pub fn not_found<T: Into<String>>(resource_type: T) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: None }
    }

    /// Create a not-found error naming the missing resource
    pub fn not_found_with_id<T: Into<String>, I: Into<String>>(
        resource_type: T,
        identifier: I,
    ) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: Some(identifier.into()) }
    }

    /// Create an internal error with context
    pub fn internal_with_context<S: Into<String>, C: Into<String>>(message: S, context: C) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }

    /// Flatten the error into `(field, value)` pairs for structured logging
    pub fn as_tracing_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("error_type", self.error_type_name().to_string())];

        match self {
            Self::Config { message, field } => {
                fields.push(("message", message.clone()));
                if let Some(field) = field {
                    fields.push(("field", field.clone()));
                }
            }
            Self::Serialization { message, format } => {
                fields.push(("message", message.clone()));
                if let Some(format) = format {
                    fields.push(("format", format.clone()));
                }
            }
            Self::Persistence { message, operation } => {
                fields.push(("message", message.clone()));
                if let Some(op) = operation {
                    fields.push(("operation", op.clone()));
                }
            }
            Self::NotFound { resource_type, identifier } => {
                fields.push(("resource_type", resource_type.clone()));
                if let Some(id) = identifier {
                    fields.push(("identifier", id.clone()));
                }
            }
            Self::Internal { message, context } => {
                fields.push(("message", message.clone()));
                if let Some(ctx) = context {
                    fields.push(("context", ctx.clone()));
                }
            }
        }

        fields
    }

    /// Get the error type name for categorization
    fn error_type_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
            Self::NotFound { .. } => "not_found",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Error classification trait for consistent error handling across crates
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use smartcache_common::error::{ErrorClassification, ErrorSeverity};
///
/// #[derive(Debug)]
/// enum FetchError {
///     Unreachable,
///     Malformed,
/// }
///
/// impl ErrorClassification for FetchError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, Self::Unreachable)
///     }
///
///     fn severity(&self) -> ErrorSeverity {
///         match self {
///             Self::Unreachable => ErrorSeverity::Warning,
///             Self::Malformed => ErrorSeverity::Error,
///         }
///     }
///
///     fn is_critical(&self) -> bool {
///         false
///     }
///
///     fn retry_after(&self) -> Option<Duration> {
///         None
///     }
/// }
///
/// assert!(FetchError::Unreachable.is_retryable());
/// ```
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again without changing any input.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}
