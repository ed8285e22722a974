//! Configuration for the key-set store.
//!
//! [`KeySetStoreConfig`] names the owning service (which determines the table
//! and index names), the RSA key size used for new application key pairs, and
//! how write conflicts and version strings are handled.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default RSA modulus size for generated application key pairs.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest RSA modulus size the store accepts.
pub const MIN_KEY_BITS: usize = 1024;

/// Configuration for [`KeySetStore`](crate::KeySetStore).
///
/// # Example
///
/// ```
/// use keyset_store::{KeySetStoreConfig, VersionPolicy};
///
/// let config = KeySetStoreConfig::builder()
///     .service_name("billing")
///     .version_policy(VersionPolicy::FixedWidth(24))
///     .build()?;
///
/// assert_eq!(config.key_bits(), 2048);
/// # Ok::<(), keyset_store::ConfigError>(())
/// ```
///
/// Configurations can also be loaded with serde; call
/// [`validate`](Self::validate) afterwards:
///
/// ```
/// use keyset_store::KeySetStoreConfig;
///
/// let config: KeySetStoreConfig = serde_json::from_str(
///     r#"{ "service_name": "billing", "cas_retry": { "base_delay": "25ms" } }"#,
/// )?;
/// config.validate()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeySetStoreConfig {
    /// Owning service; prefixes the table and index names.
    pub(crate) service_name: String,

    /// RSA modulus size for new application key pairs. The store's key
    /// source must generate moduli of this size.
    #[serde(default = "default_key_bits")]
    pub(crate) key_bits: usize,

    /// Retry behaviour for conflicting concurrent writes.
    #[serde(default)]
    pub(crate) cas_retry: CasRetryConfig,

    /// Accepted shape of version strings on write.
    #[serde(default)]
    pub(crate) version_policy: VersionPolicy,

    /// Reject new versions that sort below the latest valid one.
    ///
    /// The latest version is read before the write transaction, so two
    /// writers racing with different versions can both pass the check. Use
    /// it to catch caller mistakes, not to order concurrent rotations.
    #[serde(default)]
    pub(crate) require_newer_versions: bool,
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

/// Retry policy for compare-and-set conflicts on write.
///
/// A conflict means another writer changed the row between our read and our
/// commit. The operation is re-read and re-applied after `base_delay` plus a
/// random jitter of up to `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CasRetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    #[builder(default = default_max_retries())]
    pub max_retries: u32,

    /// Minimum delay between attempts.
    #[serde(with = "humantime_serde", default = "default_base_delay")]
    #[builder(default = default_base_delay())]
    pub base_delay: Duration,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay() -> Duration {
    Duration::from_millis(10)
}

impl Default for CasRetryConfig {
    fn default() -> Self {
        Self { max_retries: default_max_retries(), base_delay: default_base_delay() }
    }
}

/// How version strings are checked before a key set is written.
///
/// Versions are ordered lexically, so only fixed-width encodings (for example
/// zero-padded timestamps) sort chronologically. `FixedWidth` rejects writes
/// whose version has a different byte length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Any non-empty version.
    #[default]
    Opaque,
    /// Versions must be exactly this many bytes long.
    FixedWidth(usize),
}

#[bon::bon]
impl KeySetStoreConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `key_bits` - RSA modulus size (default: 2048).
    /// * `cas_retry` - Conflict retry policy (default: 5 retries, 10ms base delay).
    /// * `version_policy` - Version shape check (default: [`VersionPolicy::Opaque`]).
    /// * `require_newer_versions` - Reject out-of-order versions (default: false).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if:
    /// - `service_name` is empty or contains characters outside `[a-z0-9_]`
    /// - `key_bits` is below 1024 or not a multiple of 8
    /// - `version_policy` is `FixedWidth(0)`
    #[builder]
    pub fn new(
        #[builder(into)] service_name: String,
        #[builder(default = DEFAULT_KEY_BITS)] key_bits: usize,
        #[builder(default)] cas_retry: CasRetryConfig,
        #[builder(default)] version_policy: VersionPolicy,
        #[builder(default)] require_newer_versions: bool,
    ) -> Result<Self, ConfigError> {
        let config =
            Self { service_name, key_bits, cas_retry, version_policy, require_newer_versions };
        config.validate()?;
        Ok(config)
    }

    /// Checks every field. Needed after deserialization, which bypasses the builder.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::Missing { field: "service_name" });
        }

        if let Some(c) = self
            .service_name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
        {
            return Err(ConfigError::Invalid {
                field: "service_name",
                reason: format!("character {c:?} is not allowed; use [a-z0-9_]"),
            });
        }

        if self.key_bits < MIN_KEY_BITS {
            return Err(ConfigError::BelowMinimum {
                field: "key_bits",
                min: MIN_KEY_BITS.to_string(),
                value: self.key_bits.to_string(),
            });
        }

        if self.key_bits % 8 != 0 {
            return Err(ConfigError::Invalid {
                field: "key_bits",
                reason: format!("{} is not a multiple of 8", self.key_bits),
            });
        }

        if self.version_policy == VersionPolicy::FixedWidth(0) {
            return Err(ConfigError::Invalid {
                field: "version_policy",
                reason: "fixed width must be greater than zero".into(),
            });
        }

        Ok(())
    }

    /// Returns the owning service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns the RSA modulus size for new key pairs.
    #[must_use]
    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    /// Returns the conflict retry policy.
    #[must_use]
    pub fn cas_retry(&self) -> &CasRetryConfig {
        &self.cas_retry
    }

    /// Returns the version shape policy.
    #[must_use]
    pub fn version_policy(&self) -> VersionPolicy {
        self.version_policy
    }

    /// Returns whether out-of-order versions are rejected.
    ///
    /// The check is not atomic with the write; see the field documentation.
    #[must_use]
    pub fn require_newer_versions(&self) -> bool {
        self.require_newer_versions
    }
}
