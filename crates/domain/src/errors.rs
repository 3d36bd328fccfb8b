//! Error types used throughout the key ring

use std::fmt;
use std::time::Duration;

use ringfence_common::{CommonError, ErrorClassification, ErrorSeverity};
use thiserror::Error;

use crate::types::KeyId;

/// Why a protected payload could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadDefect {
    /// Shorter than the fixed header.
    TooShort,
    /// Top 28 bits of the header are not the expected constant.
    BadMagicHeader,
    /// Recognized header with a version nibble other than zero.
    UnsupportedVersion(u8),
}

impl fmt::Display for PayloadDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "payload is shorter than its header"),
            Self::BadMagicHeader => write!(f, "payload does not carry a recognized header"),
            Self::UnsupportedVersion(v) => write!(f, "payload version {v} is not supported"),
        }
    }
}

/// Main error type for data protection
///
/// Primitive failures are deliberately collapsed into `DecryptionFailed` /
/// `EncryptionFailed` so callers cannot learn which check rejected a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataProtectionError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(PayloadDefect),

    #[error("Key {key_id} was not found in the key ring")]
    KeyNotFound { key_id: KeyId },

    #[error("Key {key_id} has been revoked")]
    KeyRevoked { key_id: KeyId },

    #[error("The payload could not be decrypted")]
    DecryptionFailed,

    #[error("The payload could not be encrypted")]
    EncryptionFailed,

    #[error("No usable default key exists and automatic key generation is disabled")]
    NoUsableDefaultKey,

    #[error("Key repository is corrupt: {message}")]
    RepositoryCorruption { message: String },

    #[error("Key ring refresh failed: {reason}")]
    RefreshFailed { reason: String },

    #[error("Invalid key ring: {message}")]
    InvalidKeyRing { message: String },

    #[error("Storage error during '{operation}': {message}")]
    Storage { operation: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Cryptographic error: {message}")]
    Cryptography { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Operation not supported: {operation}")]
    NotSupported { operation: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for data protection operations
pub type Result<T> = std::result::Result<T, DataProtectionError>;

impl DataProtectionError {
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::RepositoryCorruption { message: message.into() }
    }

    pub fn refresh_failed(reason: impl Into<String>) -> Self {
        Self::RefreshFailed { reason: reason.into() }
    }

    pub fn invalid_key_ring(message: impl Into<String>) -> Self {
        Self::InvalidKeyRing { message: message.into() }
    }

    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage { operation: operation.into(), message: message.into() }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    pub fn cryptography(message: impl Into<String>) -> Self {
        Self::Cryptography { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported { operation: operation.into() }
    }

    /// Errors that describe the data itself rather than a transient
    /// condition; a key ring refresh surfaces these unchanged.
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::RepositoryCorruption { .. } | Self::InvalidKeyRing { .. } | Self::NoUsableDefaultKey
        )
    }
}

impl ErrorClassification for DataProtectionError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::RefreshFailed { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotSupported { .. } => ErrorSeverity::Info,
            Self::MalformedPayload(_)
            | Self::KeyNotFound { .. }
            | Self::KeyRevoked { .. }
            | Self::DecryptionFailed
            | Self::RefreshFailed { .. }
            | Self::Storage { .. } => ErrorSeverity::Warning,
            Self::EncryptionFailed
            | Self::NoUsableDefaultKey
            | Self::Serialization { .. }
            | Self::Cryptography { .. }
            | Self::Configuration { .. } => ErrorSeverity::Error,
            Self::RepositoryCorruption { .. }
            | Self::InvalidKeyRing { .. }
            | Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<CommonError> for DataProtectionError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Config { .. } | CommonError::Validation { .. } => {
                Self::configuration(err.to_string())
            }
            CommonError::Serialization { message, .. } => Self::serialization(message),
            CommonError::Persistence { message, operation } => {
                Self::storage(operation.unwrap_or_else(|| "io".to_string()), message)
            }
            CommonError::Crypto { message } => Self::cryptography(message),
            CommonError::Internal { message } => Self::Internal { message },
        }
    }
}

impl From<serde_json::Error> for DataProtectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
