//! Conversions from external infrastructure errors into domain errors.

use std::io::{Error as IoError, ErrorKind};
use std::path::Path;

use ringfence_domain::DataProtectionError;
use toml::de::Error as TomlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DataProtectionError);

impl From<InfraError> for DataProtectionError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DataProtectionError> for InfraError {
    fn from(value: DataProtectionError) -> Self {
        InfraError(value)
    }
}

trait IntoDataProtectionError {
    fn into_data_protection(self, operation: &str) -> DataProtectionError;
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → DataProtectionError */
/* -------------------------------------------------------------------------- */

impl IntoDataProtectionError for IoError {
    fn into_data_protection(self, operation: &str) -> DataProtectionError {
        let message = match self.kind() {
            ErrorKind::NotFound => format!("not found: {self}"),
            ErrorKind::PermissionDenied => format!("permission denied: {self}"),
            ErrorKind::AlreadyExists => format!("already exists: {self}"),
            ErrorKind::InvalidData => {
                return DataProtectionError::serialization(format!("invalid data: {self}"))
            }
            _ => self.to_string(),
        };
        DataProtectionError::storage(operation, message)
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_data_protection("io"))
    }
}

/// Map an I/O failure on `path` during `operation` into a storage error.
pub fn io_failure(operation: &str, path: &Path, err: IoError) -> DataProtectionError {
    match err.into_data_protection(operation) {
        DataProtectionError::Storage { operation, message } => DataProtectionError::Storage {
            operation,
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    }
}

/* -------------------------------------------------------------------------- */
/* toml::de::Error → DataProtectionError */
/* -------------------------------------------------------------------------- */

impl IntoDataProtectionError for TomlError {
    fn into_data_protection(self, _operation: &str) -> DataProtectionError {
        DataProtectionError::configuration(format!("Invalid TOML format: {self}"))
    }
}

impl From<TomlError> for InfraError {
    fn from(value: TomlError) -> Self {
        InfraError(value.into_data_protection("parse"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
