//! Deterministic helpers for tests built on the key-set store.
//!
//! Enabled with the `testutil` feature (and always in this crate's unit
//! tests). Nothing here produces usable RSA keys.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use keyset_storage::{MemoryBackend, TenantId};
use num_bigint::BigUint;

use crate::{
    config::KeySetStoreConfig,
    error::KeySetResult,
    keypair::KeyPairSource,
    signature::{KeyPairHolder, Signature},
    store::KeySetStore,
    tenant::TenantContext,
};

/// Key-pair source that hands out distinct, predictable numbers instead of
/// real key pairs. The `n`-th pair (from zero) has public modulus `1_000_003 + n`
/// and private exponent `7_000_003 + n`; the public exponent is always 65537.
#[derive(Debug, Default)]
pub struct SequentialKeyPairSource {
    next: AtomicU64,
}

impl SequentialKeyPairSource {
    /// Creates a source starting at pair zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many pairs have been handed out.
    pub fn generated(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl KeyPairSource for SequentialKeyPairSource {
    fn create_key_pair(&self) -> KeySetResult<KeyPairHolder> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let modulus = BigUint::from(1_000_003u64 + n);
        Ok(KeyPairHolder::new(
            modulus.clone(),
            BigUint::from(7_000_003u64 + n),
            modulus,
            BigUint::from(65_537u32),
        ))
    }
}

/// Identity-manager key distinct from anything [`SequentialKeyPairSource`] yields.
pub fn identity_manager_signature(seed: u64) -> Signature {
    Signature::new(BigUint::from(u64::MAX) + seed, BigUint::from(3u32))
}

/// Store for service `svc` over a [`SequentialKeyPairSource`], plus a
/// context for tenant `acme` on a fresh [`MemoryBackend`].
pub fn memory_store() -> (KeySetStore, Arc<SequentialKeyPairSource>, TenantContext<MemoryBackend>) {
    let source = Arc::new(SequentialKeyPairSource::new());
    let config = KeySetStoreConfig::builder()
        .service_name("svc")
        .build()
        .expect("test config is valid");
    let store = KeySetStore::new(config, Arc::clone(&source) as Arc<dyn KeyPairSource>)
        .expect("test config is valid");
    let tenant = TenantId::parse("acme").expect("valid tenant id");
    (store, source, TenantContext::new(tenant, MemoryBackend::new()))
}
