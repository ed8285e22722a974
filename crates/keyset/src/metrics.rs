//! Operation counters for the key-set store.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use keyset_store::{KeySetErrorKind, KeySetMetrics, Operation};
//!
//! let metrics = KeySetMetrics::new();
//! metrics.record(Operation::Read, Duration::from_micros(120));
//! metrics.record_error(KeySetErrorKind::Connection);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.read_count, 1);
//! assert_eq!(snapshot.total_errors(), 1);
//! ```

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use keyset_storage::StorageError;

use crate::error::KeySetError;

/// Store operations tracked by [`KeySetMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `create_signature_set`.
    Create,
    /// `delete_signature_set`.
    Invalidate,
    /// Single-version reads.
    Read,
    /// Version listing and latest-version resolution.
    List,
}

/// Error categories for key-set operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySetErrorKind {
    /// Rejected input.
    InvalidArgument,
    /// Write conflicts that outlasted every retry.
    Conflict,
    /// Store unreachable or timed out.
    Connection,
    /// Stored bytes could not be decoded.
    Serialization,
    /// Valid row missing key material, or schema version mismatch.
    Inconsistent,
    /// Anything else.
    Other,
}

impl KeySetErrorKind {
    /// Classifies an error.
    #[must_use]
    pub fn of(error: &KeySetError) -> Self {
        match error {
            KeySetError::InvalidArgument { .. } => Self::InvalidArgument,
            KeySetError::Inconsistent { .. } | KeySetError::SchemaMismatch { .. } => {
                Self::Inconsistent
            },
            KeySetError::Storage(storage) => match storage {
                StorageError::Conflict | StorageError::CasRetriesExhausted { .. } => Self::Conflict,
                StorageError::Connection { .. } => Self::Connection,
                StorageError::Serialization { .. } => Self::Serialization,
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }
}

#[derive(Default)]
struct Counter {
    count: AtomicU64,
    latency_us: AtomicU64,
}

impl Counter {
    fn record(&self, duration: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.latency_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    fn load(&self) -> (u64, u64) {
        (self.count.load(Ordering::Relaxed), self.latency_us.load(Ordering::Relaxed))
    }
}

#[derive(Default)]
struct Inner {
    create: Counter,
    invalidate: Counter,
    read: Counter,
    list: Counter,
    retired_reads: AtomicU64,
    errors: [AtomicU64; 6],
}

/// Thread-safe counters for store operations. Clones share state.
#[derive(Clone, Default)]
pub struct KeySetMetrics {
    inner: Arc<Inner>,
}

impl KeySetMetrics {
    /// Creates a collector with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed operation and its latency.
    pub fn record(&self, operation: Operation, duration: Duration) {
        let counter = match operation {
            Operation::Create => &self.inner.create,
            Operation::Invalidate => &self.inner.invalidate,
            Operation::Read => &self.inner.read,
            Operation::List => &self.inner.list,
        };
        counter.record(duration);
    }

    /// Records a read that found a retired key set.
    pub fn record_retired_read(&self) {
        self.inner.retired_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed operation.
    pub fn record_error(&self, kind: KeySetErrorKind) {
        self.inner.errors[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot. Counters are read independently.
    #[must_use]
    pub fn snapshot(&self) -> KeySetMetricsSnapshot {
        let (create_count, create_latency_us) = self.inner.create.load();
        let (invalidate_count, invalidate_latency_us) = self.inner.invalidate.load();
        let (read_count, read_latency_us) = self.inner.read.load();
        let (list_count, list_latency_us) = self.inner.list.load();
        let error = |kind: KeySetErrorKind| self.inner.errors[kind as usize].load(Ordering::Relaxed);

        KeySetMetricsSnapshot::builder()
            .create_count(create_count)
            .create_latency_us(create_latency_us)
            .invalidate_count(invalidate_count)
            .invalidate_latency_us(invalidate_latency_us)
            .read_count(read_count)
            .read_latency_us(read_latency_us)
            .list_count(list_count)
            .list_latency_us(list_latency_us)
            .retired_reads(self.inner.retired_reads.load(Ordering::Relaxed))
            .error_invalid_argument(error(KeySetErrorKind::InvalidArgument))
            .error_conflict(error(KeySetErrorKind::Conflict))
            .error_connection(error(KeySetErrorKind::Connection))
            .error_serialization(error(KeySetErrorKind::Serialization))
            .error_inconsistent(error(KeySetErrorKind::Inconsistent))
            .error_other(error(KeySetErrorKind::Other))
            .build()
    }
}

impl fmt::Debug for KeySetMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeySetMetrics").field(&self.snapshot()).finish()
    }
}

/// Counter values at a point in time. Latencies are cumulative microseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct KeySetMetricsSnapshot {
    /// Completed `create_signature_set` calls.
    #[builder(default)]
    pub create_count: u64,
    /// Total create latency.
    #[builder(default)]
    pub create_latency_us: u64,
    /// Completed `delete_signature_set` calls.
    #[builder(default)]
    pub invalidate_count: u64,
    /// Total invalidate latency.
    #[builder(default)]
    pub invalidate_latency_us: u64,
    /// Completed single-version reads.
    #[builder(default)]
    pub read_count: u64,
    /// Total read latency.
    #[builder(default)]
    pub read_latency_us: u64,
    /// Completed listings and latest-version lookups.
    #[builder(default)]
    pub list_count: u64,
    /// Total list latency.
    #[builder(default)]
    pub list_latency_us: u64,
    /// Reads that hit a retired key set.
    #[builder(default)]
    pub retired_reads: u64,
    /// Rejected-input errors.
    #[builder(default)]
    pub error_invalid_argument: u64,
    /// Exhausted-retry conflicts.
    #[builder(default)]
    pub error_conflict: u64,
    /// Connection errors.
    #[builder(default)]
    pub error_connection: u64,
    /// Decode errors.
    #[builder(default)]
    pub error_serialization: u64,
    /// Inconsistent data or schema.
    #[builder(default)]
    pub error_inconsistent: u64,
    /// Other errors.
    #[builder(default)]
    pub error_other: u64,
}

impl KeySetMetricsSnapshot {
    /// Returns the number of completed operations.
    #[must_use]
    pub fn total_operations(&self) -> u64 {
        self.create_count + self.invalidate_count + self.read_count + self.list_count
    }

    /// Returns the number of failed operations.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.error_invalid_argument
            + self.error_conflict
            + self.error_connection
            + self.error_serialization
            + self.error_inconsistent
            + self.error_other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_per_operation() {
        let metrics = KeySetMetrics::new();
        metrics.record(Operation::Create, Duration::from_micros(900));
        metrics.record(Operation::Create, Duration::from_micros(100));
        metrics.record(Operation::List, Duration::from_micros(40));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.create_count, 2);
        assert_eq!(snapshot.create_latency_us, 1000);
        assert_eq!(snapshot.list_count, 1);
        assert_eq!(snapshot.read_count, 0);
        assert_eq!(snapshot.total_operations(), 3);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = KeySetMetrics::new();
        let clone = metrics.clone();
        clone.record_retired_read();
        clone.record_error(KeySetErrorKind::Serialization);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.retired_reads, 1);
        assert_eq!(snapshot.error_serialization, 1);
        assert_eq!(snapshot.total_errors(), 1);
    }

    #[test]
    fn test_error_classification() {
        let cases = [
            (KeySetError::invalid_argument("version", "empty"), KeySetErrorKind::InvalidArgument),
            (StorageError::cas_retries_exhausted(3).into(), KeySetErrorKind::Conflict),
            (StorageError::connection("down").into(), KeySetErrorKind::Connection),
            (StorageError::serialization("bad json").into(), KeySetErrorKind::Serialization),
            (KeySetError::inconsistent("v1", "modulus missing"), KeySetErrorKind::Inconsistent),
            (StorageError::internal("boom").into(), KeySetErrorKind::Other),
            (KeySetError::key_generation("no entropy"), KeySetErrorKind::Other),
        ];

        for (error, expected) in cases {
            assert_eq!(KeySetErrorKind::of(&error), expected, "{error}");
        }
    }
}
