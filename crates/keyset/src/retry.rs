//! Retry loop for compare-and-set conflicts.

use std::{future::Future, time::Duration};

use keyset_storage::StorageError;
use rand::Rng;

use crate::{
    config::CasRetryConfig,
    error::{KeySetError, KeySetResult},
};

/// Runs `operation`, re-running it when it fails with a CAS conflict.
///
/// Each attempt must re-read whatever state it compares against; the closure
/// is called again from scratch after every conflict. Non-conflict errors
/// return immediately. After `max_retries + 1` conflicting attempts the
/// result is [`StorageError::CasRetriesExhausted`].
pub(crate) async fn with_cas_retry<T, F, Fut>(
    config: &CasRetryConfig,
    mut operation: F,
) -> KeySetResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = KeySetResult<T>>,
{
    for attempt in 0..=config.max_retries {
        match operation().await {
            Err(KeySetError::Storage(StorageError::Conflict)) if attempt < config.max_retries => {
                let delay = config.base_delay + jitter(config.base_delay);
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "CAS conflict, retrying after jitter",
                );
                tokio::time::sleep(delay).await;
            },
            Err(KeySetError::Storage(StorageError::Conflict)) => {
                tracing::warn!(attempts = config.max_retries + 1, "CAS retries exhausted");
                return Err(StorageError::cas_retries_exhausted(config.max_retries + 1).into());
            },
            other => return other,
        }
    }

    Err(StorageError::cas_retries_exhausted(config.max_retries + 1).into())
}

/// Uniform random delay in `0..=base`.
fn jitter(base: Duration) -> Duration {
    let range = base.as_millis() as u64;
    if range == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=range))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_retries: u32) -> CasRetryConfig {
        CasRetryConfig::builder().max_retries(max_retries).base_delay(Duration::ZERO).build()
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_cas_retry(&fast(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, KeySetError>(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_cas_retry(&fast(3), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(StorageError::conflict().into());
            }
            Ok(())
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let calls = AtomicU32::new(0);
        let result: KeySetResult<()> = with_cas_retry(&fast(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::conflict().into())
        })
        .await;

        match result {
            Err(KeySetError::Storage(StorageError::CasRetriesExhausted { attempts })) => {
                assert_eq!(attempts, 3);
            },
            other => panic!("expected CasRetriesExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: KeySetResult<()> = with_cas_retry(&fast(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::connection("down").into())
        })
        .await;

        assert!(matches!(result, Err(KeySetError::Storage(StorageError::Connection { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_jitter_bounded_by_base() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(jitter(Duration::from_millis(5)) <= Duration::from_millis(5));
        }
    }
}
