//! Shared test utilities for code built on [`StorageBackend`].
//!
//! This module provides a fault-injecting backend wrapper and assertion
//! macros. It is feature-gated behind `testutil` to prevent leaking into
//! production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keyset-storage = { path = "../storage", features = ["testutil"] }
//! ```

use std::{
    ops::RangeBounds,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    StorageBackend,
    error::{StorageError, StorageResult},
    transaction::Transaction,
    types::KeyValue,
};

#[derive(Debug, Default)]
struct FaultState {
    unavailable: AtomicBool,
    commit_conflicts: AtomicU32,
    calls: AtomicU64,
}

impl FaultState {
    fn check(&self) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::connection("injected: backend unavailable"));
        }
        Ok(())
    }

    fn take_conflict(&self) -> bool {
        self.commit_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Backend wrapper that injects failures into an inner backend.
///
/// - [`set_unavailable`](Self::set_unavailable) makes every call fail with
///   [`StorageError::Connection`].
/// - [`inject_commit_conflicts`](Self::inject_commit_conflicts) makes the next
///   `n` transaction commits fail with [`StorageError::Conflict`], as if a
///   concurrent writer had landed first.
///
/// Clones share the same fault state.
#[derive(Debug, Clone)]
pub struct FailingBackend<B> {
    inner: B,
    state: Arc<FaultState>,
}

impl<B: StorageBackend> FailingBackend<B> {
    /// Wraps `inner` with no faults enabled.
    pub fn new(inner: B) -> Self {
        Self { inner, state: Arc::new(FaultState::default()) }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Toggles the "backend unreachable" fault.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `count` transaction commits fail with a conflict.
    pub fn inject_commit_conflicts(&self, count: u32) {
        self.state.commit_conflicts.store(count, Ordering::SeqCst);
    }

    /// Returns the number of calls that reached this wrapper.
    pub fn calls(&self) -> u64 {
        self.state.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for FailingBackend<B> {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        self.state.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.state.check()?;
        self.inner.set(key, value).await
    }

    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        self.state.check()?;
        self.inner.compare_and_set(key, expected, new_value).await
    }

    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        self.state.check()?;
        self.inner.get_range(range).await
    }

    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        self.state.check()?;
        let inner = self.inner.transaction().await?;
        Ok(Box::new(FailingTransaction { inner, state: Arc::clone(&self.state) }))
    }
}

struct FailingTransaction {
    inner: Box<dyn Transaction>,
    state: Arc<FaultState>,
}

#[async_trait]
impl Transaction for FailingTransaction {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.inner.set(key, value);
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.inner.delete(key);
    }

    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        self.inner.compare_and_set(key, expected, new_value)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.state.check()?;
        if self.state.take_conflict() {
            return Err(StorageError::Conflict);
        }
        self.inner.commit().await
    }
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}
