//! Versioned, per-tenant store of identity-manager and application keys.
//!
//! Each tenant owns an append-mostly set of *key sets*, one per version
//! string (typically a rotation timestamp). A key set pairs the public key of
//! the tenant's identity manager with an application RSA key pair generated
//! at creation time. Key sets are never deleted, only retired; readers treat
//! retired and absent versions alike. The *latest* key set is the one with
//! the lexically greatest valid version.
//!
//! Storage goes through [`keyset_storage::StorageBackend`], one session per
//! tenant ([`TenantContext`]).
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use keyset_storage::{MemoryBackend, TenantId};
//! use keyset_store::{
//!     KeySetStore, KeySetStoreConfig, RsaKeyPairSource, SharedBackendSessions, Signature,
//!     TenantSessionProvider,
//! };
//! use num_bigint::BigUint;
//!
//! # tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap().block_on(async {
//! let config = KeySetStoreConfig::builder().service_name("billing").key_bits(1024).build()?;
//! let key_source = Arc::new(RsaKeyPairSource::from_config(&config));
//! let store = KeySetStore::new(config, key_source)?;
//!
//! let sessions = SharedBackendSessions::new(MemoryBackend::new());
//! let ctx = sessions.tenant_session(&TenantId::parse("acme")?).await?;
//!
//! let identity_manager = Signature::new(BigUint::from(3233u32), BigUint::from(17u32));
//! store.create_signature_set(&ctx, "2023-01-01T00:00:00Z", &identity_manager).await?;
//! store.create_signature_set(&ctx, "2023-02-01T00:00:00Z", &identity_manager).await?;
//! store.delete_signature_set(&ctx, "2023-02-01T00:00:00Z").await?;
//!
//! let latest = store.get_latest_signature_set(&ctx).await?.expect("one valid key set");
//! assert_eq!(latest.version, "2023-01-01T00:00:00Z");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a deterministic
//!   key-pair source and store fixtures.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod keypair;
pub mod layout;
pub mod metrics;
mod record;
mod retry;
mod schema;
pub mod signature;
pub mod store;
pub mod tenant;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
mod version;

pub use config::{CasRetryConfig, KeySetStoreConfig, VersionPolicy};
pub use error::{ConfigError, KeySetError, KeySetResult};
pub use keypair::{KeyPairSource, RsaKeyPairSource};
pub use layout::KeySetLayout;
pub use metrics::{KeySetErrorKind, KeySetMetrics, KeySetMetricsSnapshot, Operation};
pub use schema::SCHEMA_VERSION;
pub use signature::{KeyPairHolder, Signature, SignatureSet};
pub use store::KeySetStore;
pub use tenant::{SharedBackendSessions, TenantContext, TenantSessionProvider};
