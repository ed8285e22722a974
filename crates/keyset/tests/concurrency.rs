//! Concurrent writers against one tenant.
//!
//! Rotations for the same version must converge on a single, valid row whose
//! key material came from exactly one of the competing writers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use common::{fast_retry, idm, store, tenant};
use keyset_storage::MemoryBackend;
use keyset_store::Signature;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_version_rotations_converge() {
    let store = Arc::new(store(fast_retry(50)));
    let ctx = Arc::new(tenant("acme", MemoryBackend::new()));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { store.create_signature_set(&ctx, "2023-01-01", &idm(i)).await })
        })
        .collect();

    let mut returned: Vec<Signature> = Vec::new();
    for handle in handles {
        returned.push(handle.await.expect("join").expect("create"));
    }

    let stored = store.get_signature_set(&ctx, "2023-01-01").await.unwrap().expect("valid row");
    assert!(
        returned.contains(&stored.application_signature),
        "stored key must come from one of the writers"
    );

    // Key material is never mixed between writers: the winner's identity
    // manager key is stored next to the winner's application key.
    let winner = returned.iter().position(|s| *s == stored.application_signature).unwrap();
    assert_eq!(stored.identity_manager_signature, idm(winner as u32));

    assert_eq!(store.get_all_signature_set_key_timestamps(&ctx).await.unwrap(), vec!["2023-01-01"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_versions_do_not_interfere() {
    let store = Arc::new(store(fast_retry(50)));
    let ctx = Arc::new(tenant("acme", MemoryBackend::new()));

    let handles: Vec<_> = (0..20u32)
        .map(|i| {
            let store = Arc::clone(&store);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let version = format!("2023-01-{:02}", i + 1);
                let app = store.create_signature_set(&ctx, &version, &idm(i)).await?;
                Ok::<_, keyset_store::KeySetError>((version, app))
            })
        })
        .collect();

    let mut created = Vec::new();
    for handle in handles {
        created.push(handle.await.expect("join").expect("create"));
    }

    for (version, app) in &created {
        assert_eq!(store.get_application_signature(&ctx, version).await.unwrap().as_ref(), Some(app));
    }

    let versions = store.get_all_signature_set_key_timestamps(&ctx).await.unwrap();
    assert_eq!(versions.len(), 20);
    assert!(versions.windows(2).all(|w| w[0] < w[1]), "versions are listed in order");

    let latest = store.get_latest_signature_set(&ctx).await.unwrap().unwrap();
    assert_eq!(latest.version, "2023-01-20");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_retire_and_rotate_leave_row_and_index_in_step() {
    let store = Arc::new(store(fast_retry(50)));
    let ctx = Arc::new(tenant("acme", MemoryBackend::new()));
    store.create_signature_set(&ctx, "v1", &idm(0)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let store = Arc::clone(&store);
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                store.delete_signature_set(&ctx, "v1").await
            } else {
                store.create_signature_set(&ctx, "v1", &idm(i)).await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("operation");
    }

    // Whatever the interleaving, the listing agrees with the row.
    let listed = store.get_all_signature_set_key_timestamps(&ctx).await.unwrap();
    let readable = store.get_signature_set(&ctx, "v1").await.unwrap();
    assert_eq!(listed.is_empty(), readable.is_none());
}
