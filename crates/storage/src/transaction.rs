//! Transaction trait for atomic storage operations.
//!
//! This module defines the [`Transaction`] trait that enables atomic
//! multi-operation commits to storage backends.
//!
//! # Transaction Semantics
//!
//! Transactions provide:
//! - **Atomicity**: All operations in a transaction either succeed together or fail together
//! - **Buffering**: Writes are buffered until commit
//!
//! # Example
//!
//! ```
//! use keyset_storage::{MemoryBackend, StorageBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//!
//! // A row and its index entry land together or not at all
//! let mut txn = backend.transaction().await.unwrap();
//! txn.compare_and_set(b"t/rows/v1".to_vec(), None, b"{}".to_vec()).unwrap();
//! txn.set(b"t/index/v1".to_vec(), Vec::new());
//! txn.commit().await.unwrap();
//!
//! assert!(backend.get(b"t/index/v1").await.unwrap().is_some());
//! # });
//! ```

use async_trait::async_trait;

use crate::error::StorageResult;

/// Transaction handle for atomic multi-operation commits.
///
/// A transaction buffers operations (sets, deletes and compare-and-sets) until
/// [`commit`](Transaction::commit) is called, at which point all operations are
/// applied atomically.
///
/// # Concurrency
///
/// Compare-and-set preconditions are evaluated at commit time under the
/// backend's write lock. If any precondition fails, the commit fails with
/// [`StorageError::Conflict`](crate::StorageError::Conflict) and nothing is applied.
#[async_trait]
pub trait Transaction: Send {
    /// Buffers a set operation within the transaction.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Buffers a delete operation within the transaction.
    fn delete(&mut self, key: Vec<u8>);

    /// Buffers a compare-and-set operation within the transaction.
    ///
    /// The condition is checked at commit time, not when this method is called.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to update
    /// * `expected` - The expected current value. Use `None` to require the key doesn't exist.
    /// * `new_value` - The new value to set if the comparison succeeds
    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Commits all buffered operations atomically.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if a compare-and-set
    ///   precondition no longer holds
    /// - Other [`StorageError`](crate::StorageError) variants on backend failures
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
