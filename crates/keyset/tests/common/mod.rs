//! Fixtures shared by the key-set store integration tests.

#![allow(dead_code, clippy::expect_used)]

use std::sync::Arc;

use keyset_storage::{StorageBackend, TenantId};
use keyset_store::{
    CasRetryConfig, KeySetStore, KeySetStoreConfig, Signature, TenantContext,
    testutil::{SequentialKeyPairSource, identity_manager_signature},
};

pub fn idm(seed: u32) -> Signature {
    identity_manager_signature(u64::from(seed))
}

pub fn store(retry: CasRetryConfig) -> KeySetStore {
    let config = KeySetStoreConfig::builder()
        .service_name("billing")
        .cas_retry(retry)
        .build()
        .expect("valid config");
    KeySetStore::new(config, Arc::new(SequentialKeyPairSource::new())).expect("valid config")
}

pub fn fast_retry(max_retries: u32) -> CasRetryConfig {
    CasRetryConfig::builder().max_retries(max_retries).base_delay(std::time::Duration::ZERO).build()
}

pub fn tenant<B: StorageBackend>(id: &str, session: B) -> TenantContext<B> {
    TenantContext::new(TenantId::parse(id).expect("valid tenant id"), session)
}
