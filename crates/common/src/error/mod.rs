//! Common error types and classification shared across Ringfence crates.
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: failures raised by the shared utility layer
//!    (configuration parsing, serialization, file I/O, primitive crypto).
//! 2. **`ErrorClassification`**: a standard interface for classifying errors
//!    by retryability and severity, implemented by every crate-level error.
//! 3. **`ErrorSeverity`**: a unified severity scale used to pick log levels.
//!
//! Crate-specific errors should compose with `CommonError` through a `From`
//! conversion rather than duplicating its variants:
//!
//! ```rust,ignore
//! impl From<CommonError> for DataProtectionError {
//!     fn from(err: CommonError) -> Self {
//!         match err {
//!             CommonError::Crypto { message } => Self::Cryptography { message },
//!             other => Self::Internal { message: other.to_string() },
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Error variants raised by the shared utility layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// Configuration-related errors
    #[error("Configuration error{}: {message}", qualifier(" in field '", .field, "'"))]
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    #[error("Serialization error{}: {message}", qualifier(" (", .format, ")"))]
    Serialization { message: String, format: Option<String> },

    /// Data persistence errors (file I/O)
    #[error("Persistence error{}: {message}", qualifier(" during '", .operation, "'"))]
    Persistence { message: String, operation: Option<String> },

    /// Validation errors
    #[error("Validation error for field '{field}': {message}")]
    Validation { field: String, message: String },

    /// Primitive cryptographic failures
    ///
    /// Messages never carry key material or authentication-tag details.
    #[error("Cryptographic error: {message}")]
    Crypto { message: String },

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Optional context rendered between `open` and `close`, or nothing.
fn qualifier(open: &str, value: &Option<String>, close: &str) -> String {
    value.as_ref().map(|value| format!("{open}{value}{close}")).unwrap_or_default()
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Persistence { .. } => ErrorSeverity::Warning,
            Self::Config { .. } | Self::Serialization { .. } | Self::Validation { .. } => {
                ErrorSeverity::Error
            }
            Self::Crypto { .. } | Self::Internal { .. } => ErrorSeverity::Critical,
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

    /// Create a simple serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization { message: message.into(), format: None }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a simple persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Create a persistence error for a specific operation
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create a primitive crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto { message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }
}

/// Error classification trait for consistent error handling across crates
///
/// Implementations let callers make uniform retry and logging decisions
/// without matching on every concrete variant.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient conditions (storage hiccups, a refresh
    /// that failed because the backend was unavailable) that may succeed if
    /// attempted again.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    ///
    /// Critical errors typically indicate data corruption or violated
    /// invariants.
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

impl From<base64::DecodeError> for CommonError {
    fn from(err: base64::DecodeError) -> Self {
        Self::serialization_format("base64", err.to_string())
    }
}
