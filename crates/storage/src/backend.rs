//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the session abstraction the
//! key-set store issues its reads and writes against. Each tenant's data lives
//! under its own key prefix; the trait itself knows nothing about tenants.
//!
//! # Design Philosophy
//!
//! The trait provides a minimal, generic key-value interface:
//! - **Keys and values are bytes**: No assumptions about serialization format
//! - **Async by default**: All operations are async for non-blocking I/O
//! - **Range queries supported**: Ordered prefix scans stand in for secondary indexes
//! - **Conditional writes**: Compare-and-set, standalone or inside a transaction
//!
//! Domain-specific logic (key-set records, validity indexes) lives in the
//! repository layer built on top of this trait, not in the storage backends.
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Implement a corresponding [`Transaction`] type
//! 3. Map backend-specific errors to [`StorageError`](crate::StorageError)
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use std::ops::{Bound, RangeBounds};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, transaction::Transaction, types::KeyValue};

/// Abstract storage backend for key-value operations.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair |
/// | [`compare_and_set`](StorageBackend::compare_and_set) | Atomic compare-and-swap |
/// | [`get_range`](StorageBackend::get_range) | Retrieve multiple keys in a range |
/// | [`transaction`](StorageBackend::transaction) | Begin an atomic transaction |
///
/// Keys are only removed through a committed [`Transaction`]; there is no
/// standalone delete, so a caller cannot drop a row outside the
/// transaction that keeps it consistent with its index.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use keyset_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.set(b"key".to_vec(), b"value".to_vec()).await.unwrap();
/// let value = backend.get(b"key").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("value")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` on storage errors
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair, overwriting any existing value.
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Atomically sets a key's value if it matches the expected current value.
    ///
    /// - **`expected: None`**: insert-if-absent. Fails with
    ///   [`Conflict`](crate::StorageError::Conflict) if any value is present.
    /// - **`expected: Some(value)`**: update-if-unchanged. Fails with
    ///   [`Conflict`](crate::StorageError::Conflict) if the key is absent or holds a
    ///   different value.
    ///
    /// The comparison is an exact byte equality check.
    ///
    /// # Examples
    ///
    /// ```
    /// use keyset_storage::{MemoryBackend, StorageBackend};
    ///
    /// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
    /// let backend = MemoryBackend::new();
    ///
    /// // Insert-if-absent: succeeds because key is new
    /// backend.compare_and_set(b"schema", None, b"v1".to_vec()).await.unwrap();
    ///
    /// // Insert-if-absent again: fails with Conflict because key already exists
    /// assert!(backend.compare_and_set(b"schema", None, b"v1".to_vec()).await.is_err());
    /// # });
    /// ```
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Retrieves all key-value pairs within a range, in key order.
    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send;

    /// Begins a new transaction.
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>>;
}

/// Returns the key range covering every key that starts with `prefix`.
///
/// The upper bound is the smallest key greater than all keys sharing the
/// prefix. A prefix made only of `0xFF` bytes (or an empty prefix) has no
/// such key, so the range is unbounded above.
///
/// # Examples
///
/// ```
/// use std::ops::RangeBounds;
/// use keyset_storage::prefix_range;
///
/// let range = prefix_range(b"acme/rows/");
/// assert!(range.contains(&b"acme/rows/2023-01-01".to_vec()));
/// assert!(!range.contains(&b"acme/rowz".to_vec()));
/// ```
#[must_use]
pub fn prefix_range(prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let start = Bound::Included(prefix.to_vec());

    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return (start, Bound::Excluded(end));
        }
    }

    (start, Bound::Unbounded)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_prefix_range_increments_last_byte() {
        let (start, end) = prefix_range(b"t/rows/");
        assert_eq!(start, Bound::Included(b"t/rows/".to_vec()));
        assert_eq!(end, Bound::Excluded(b"t/rows0".to_vec()));
    }

    #[test]
    fn test_prefix_range_carries_over_max_bytes() {
        let (_, end) = prefix_range(&[0x61, 0xFF, 0xFF]);
        assert_eq!(end, Bound::Excluded(vec![0x62]));

        let (_, end) = prefix_range(&[0xFF]);
        assert_eq!(end, Bound::Unbounded);
    }

    proptest! {
        /// Every key that starts with the prefix falls inside the range, and
        /// every key that does not start with it falls outside.
        #[test]
        fn prefix_range_matches_starts_with(
            prefix in proptest::collection::vec(any::<u8>(), 0..8),
            key in proptest::collection::vec(any::<u8>(), 0..12),
        ) {
            let range = prefix_range(&prefix);
            prop_assert_eq!(range.contains(&key), key.starts_with(&prefix));
        }
    }
}
