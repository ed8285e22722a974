//! Key-set store error types.
//!
//! Absent or retired key sets are not errors: reads return `Ok(None)` for
//! both. The variants here cover malformed input, store outages, and data
//! that contradicts the writer's guarantees.

use std::sync::Arc;

use keyset_storage::{BoxError, StorageError};
use thiserror::Error;

/// Result type alias for key-set store operations.
pub type KeySetResult<T> = Result<T, KeySetError>;

/// Errors returned by [`KeySetStore`](crate::KeySetStore) operations.
///
/// # Non-exhaustive
///
/// New variants may be added without a semver-breaking change. Downstream
/// match expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeySetError {
    /// A required input is missing or malformed. Raised before any I/O.
    #[error("Invalid argument `{field}`: {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The underlying data store failed. Propagated unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A row marked valid is missing key material the writer always stores.
    #[error("Key set '{version}' is inconsistent: {message}")]
    Inconsistent {
        /// Version of the offending record.
        version: String,
        /// Which part of the record is missing or malformed.
        message: String,
    },

    /// An existing table or index was created with a different schema version.
    #[error("Schema object '{name}' has version {found}, expected {expected}")]
    SchemaMismatch {
        /// Table or index name.
        name: String,
        /// Schema version this build writes.
        expected: u32,
        /// Schema version found in storage.
        found: u32,
    },

    /// The key-pair source could not produce a key pair.
    #[error("Key generation failed: {message}")]
    KeyGeneration {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The store configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl KeySetError {
    /// Creates a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument { field, reason: reason.into() }
    }

    /// Creates a new `Inconsistent` error.
    #[must_use]
    pub fn inconsistent(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Inconsistent { version: version.into(), message: message.into() }
    }

    /// Creates a new `KeyGeneration` error with a source error.
    #[must_use]
    pub fn key_generation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::KeyGeneration { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `KeyGeneration` error without a source.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration { message: message.into(), source: None }
    }

    /// Returns the storage error if this failure came from the data store.
    #[must_use]
    pub fn as_storage(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {field}")]
    Missing {
        /// Field name.
        field: &'static str,
    },

    /// A field has a value outside its accepted format.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A numeric field is below its minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Field name.
        field: &'static str,
        /// Minimum accepted value.
        min: String,
        /// Value that was provided.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_storage_errors_pass_through_unchanged() {
        let err = KeySetError::from(StorageError::connection("cluster unreachable"));
        assert_eq!(err.to_string(), "Connection error: cluster unreachable");
        assert!(matches!(err.as_storage(), Some(StorageError::Connection { .. })));
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = KeySetError::invalid_argument("version", "must not be empty");
        assert_eq!(err.to_string(), "Invalid argument `version`: must not be empty");
        assert!(err.as_storage().is_none());
    }

    #[test]
    fn test_key_generation_keeps_source() {
        let io = std::io::Error::other("entropy pool empty");
        let err = KeySetError::key_generation_with_source("RSA key generation failed", io);
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("entropy pool empty"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::BelowMinimum { field: "key_bits", min: "1024".into(), value: "512".into() };
        assert_eq!(err.to_string(), "key_bits must be at least 1024, got 512");
    }
}
