//! Storage backend abstraction for the tenant key-set store.
//!
//! This crate provides the [`StorageBackend`] trait and related types that the
//! key-set store (`keyset-store`) issues its reads and writes against. A backend
//! plays the role of a tenant's data-store session: the store decides which
//! keys to touch, the backend only moves bytes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   keyset-store                              │
//! │   Schema Manager │ Writer │ Invalidator │ Reader │ Latest   │
//! │      (record encoding, key layout, validity index)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   keyset-storage                            │
//! │                StorageBackend trait                         │
//! │  (get, set, compare_and_set, delete, get_range, transaction)│
//! ├─────────────────────────────────────────────────────────────┤
//! │                   MemoryBackend                             │
//! │              (testing, development)                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use keyset_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"acme/rows/2023-01-01".to_vec(), b"{}".to_vec()).await?;
//!
//!     let value = backend.get(b"acme/rows/2023-01-01").await?;
//!     assert_eq!(value.map(|b| b.to_vec()), Some(b"{}".to_vec()));
//!
//!     // Use transactions to keep a row and its index entry in step
//!     let mut txn = backend.transaction().await?;
//!     txn.compare_and_set(b"acme/rows/2023-02-01".to_vec(), None, b"{}".to_vec())?;
//!     txn.set(b"acme/index/2023-02-01".to_vec(), Vec::new());
//!     txn.commit().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`], which wraps potential
//! [`StorageError`] variants. Backends should map their internal errors
//! to these variants.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with a fault-injecting backend wrapper and
//!   assertion macros. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod transaction;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::{StorageBackend, prefix_range};
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use transaction::Transaction;
pub use types::{KeyValue, TenantId};
