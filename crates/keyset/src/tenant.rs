//! Per-tenant data-store sessions.
//!
//! Every store operation runs against the session of one tenant. Callers
//! resolve a [`TenantContext`] through a [`TenantSessionProvider`] (or build
//! one directly) and pass it in per call; the store never caches sessions.

use async_trait::async_trait;
use keyset_storage::{StorageBackend, StorageResult, TenantId};

/// A tenant id paired with that tenant's data-store session.
#[derive(Debug, Clone)]
pub struct TenantContext<B> {
    tenant: TenantId,
    session: B,
}

impl<B: StorageBackend> TenantContext<B> {
    /// Pairs `tenant` with `session`.
    pub fn new(tenant: TenantId, session: B) -> Self {
        Self { tenant, session }
    }

    /// Returns the tenant id.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Returns the data-store session.
    pub fn session(&self) -> &B {
        &self.session
    }
}

/// Resolves the data-store session for a tenant.
#[async_trait]
pub trait TenantSessionProvider: Send + Sync {
    /// Backend type of the sessions this provider hands out.
    type Backend: StorageBackend;

    /// Returns the context for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`](keyset_storage::StorageError) if the session
    /// cannot be established.
    async fn tenant_session(
        &self,
        tenant: &TenantId,
    ) -> StorageResult<TenantContext<Self::Backend>>;
}

/// Provider that hands every tenant a handle to the same backend.
///
/// Isolation comes from the tenant prefix in every key, so one shared
/// keyspace can hold many tenants.
#[derive(Debug, Clone)]
pub struct SharedBackendSessions<B> {
    backend: B,
}

impl<B: StorageBackend + Clone> SharedBackendSessions<B> {
    /// Creates a provider over `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: StorageBackend + Clone> TenantSessionProvider for SharedBackendSessions<B> {
    type Backend = B;

    async fn tenant_session(&self, tenant: &TenantId) -> StorageResult<TenantContext<B>> {
        Ok(TenantContext::new(tenant.clone(), self.backend.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use keyset_storage::MemoryBackend;

    use super::*;

    #[tokio::test]
    async fn test_shared_sessions_reach_the_same_backend() {
        let provider = SharedBackendSessions::new(MemoryBackend::new());

        let acme = provider.tenant_session(&TenantId::parse("acme").unwrap()).await.unwrap();
        let globex = provider.tenant_session(&TenantId::parse("globex").unwrap()).await.unwrap();
        assert_eq!(acme.tenant().as_str(), "acme");
        assert_eq!(globex.tenant().as_str(), "globex");

        acme.session().set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert!(globex.session().get(b"k").await.unwrap().is_some());
    }
}
