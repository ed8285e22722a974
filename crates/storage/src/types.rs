//! Common types used across storage operations.
//!
//! This module defines shared data structures used by storage backends
//! and their consumers.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Key-value pair returned from range queries.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use keyset_storage::KeyValue;
///
/// let kv = KeyValue::new(Bytes::from("acme/rows/2023-01-01"), Bytes::from("{}"));
/// assert_eq!(&kv.key[..], b"acme/rows/2023-01-01");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}

/// Identifier of an isolated customer or organization.
///
/// All key-set data is scoped to a tenant. The identifier becomes a key
/// segment, so it must be non-empty and must not contain `/` or control
/// characters. Use [`TenantId::parse`] to construct a checked value.
///
/// # Examples
///
/// ```
/// use keyset_storage::TenantId;
///
/// let tenant = TenantId::parse("acme").unwrap();
/// assert_eq!(tenant.to_string(), "acme");
/// assert!(TenantId::parse("a/b").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validates and wraps a tenant identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the identifier is empty or
    /// contains `/` or a control character.
    pub fn parse(value: impl Into<String>) -> StorageResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(StorageError::internal("tenant id must not be empty"));
        }
        if value.chars().any(|c| c == '/' || c.is_control()) {
            return Err(StorageError::internal(format!(
                "tenant id contains a reserved character: {value:?}"
            )));
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
