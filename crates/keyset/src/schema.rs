//! Idempotent creation of the key-set table and validity index.
//!
//! Both objects are described by a small JSON descriptor stored under the
//! object's `schema` key. Creation is an insert-if-absent, so concurrent
//! callers race safely: whoever loses the race finds the winner's descriptor
//! and accepts it, as long as it describes the same schema version.

use keyset_storage::{StorageBackend, StorageError, StorageResult};
use serde::{Deserialize, Serialize};

use crate::{
    error::{KeySetError, KeySetResult},
    layout::KeySetLayout,
    tenant::TenantContext,
};

/// Schema version written by this build. Part of the table name as `_v1_`.
pub const SCHEMA_VERSION: u32 = 1;

const TABLE_COLUMNS: &[&str] = &[
    "timestamp",
    "valid",
    "identity_manager_public_key_mod",
    "identity_manager_public_key_exp",
    "application_private_key_mod",
    "application_private_key_exp",
    "application_public_key_mod",
    "application_public_key_exp",
    "updated_at",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ObjectKind {
    Table,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SchemaDescriptor {
    kind: ObjectKind,
    name: String,
    schema_version: u32,
    primary_key: Option<String>,
    columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_table: Option<String>,
}

impl SchemaDescriptor {
    fn table(layout: &KeySetLayout) -> Self {
        Self {
            kind: ObjectKind::Table,
            name: layout.table_name().to_owned(),
            schema_version: SCHEMA_VERSION,
            primary_key: Some("timestamp".into()),
            columns: TABLE_COLUMNS.iter().map(|c| (*c).to_owned()).collect(),
            on_table: None,
        }
    }

    fn index(layout: &KeySetLayout) -> Self {
        Self {
            kind: ObjectKind::Index,
            name: layout.index_name().to_owned(),
            schema_version: SCHEMA_VERSION,
            primary_key: None,
            columns: vec!["valid".into()],
            on_table: Some(layout.table_name().to_owned()),
        }
    }

    fn encode(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            StorageError::serialization_with_source("failed to encode schema descriptor", e)
        })
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            StorageError::serialization_with_source("failed to decode schema descriptor", e)
        })
    }
}

/// Creates the key-set table and its validity index for the context's tenant
/// if they do not already exist.
///
/// Safe to call any number of times, concurrently. Existing rows are never
/// touched.
///
/// # Errors
///
/// - [`KeySetError::Storage`] if the data store fails.
/// - [`KeySetError::SchemaMismatch`] if an object exists with another schema version.
#[tracing::instrument(skip_all, fields(tenant = %ctx.tenant(), table = layout.table_name()))]
pub(crate) async fn ensure_schema<B: StorageBackend>(
    ctx: &TenantContext<B>,
    layout: &KeySetLayout,
) -> KeySetResult<()> {
    create_if_absent(ctx, layout.table_schema_key(ctx.tenant()), SchemaDescriptor::table(layout))
        .await?;
    create_if_absent(ctx, layout.index_schema_key(ctx.tenant()), SchemaDescriptor::index(layout))
        .await
}

async fn create_if_absent<B: StorageBackend>(
    ctx: &TenantContext<B>,
    key: Vec<u8>,
    descriptor: SchemaDescriptor,
) -> KeySetResult<()> {
    match ctx.session().compare_and_set(&key, None, descriptor.encode()?).await {
        Ok(()) => {
            tracing::info!(name = %descriptor.name, kind = ?descriptor.kind, "Created schema object");
            Ok(())
        },
        Err(StorageError::Conflict) => {
            let Some(existing) = ctx.session().get(&key).await? else {
                // Conflict on insert-if-absent means the key exists; it can only
                // vanish again if someone removed it out of band.
                return Err(StorageError::internal(format!(
                    "schema object {} disappeared after conflicting create",
                    descriptor.name
                ))
                .into());
            };
            let existing = SchemaDescriptor::decode(&existing)?;
            if existing.schema_version != descriptor.schema_version {
                return Err(KeySetError::SchemaMismatch {
                    name: descriptor.name,
                    expected: descriptor.schema_version,
                    found: existing.schema_version,
                });
            }
            tracing::debug!(name = %descriptor.name, "Schema object already exists");
            Ok(())
        },
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use keyset_storage::{MemoryBackend, TenantId};

    use super::*;

    fn context(backend: &MemoryBackend) -> TenantContext<MemoryBackend> {
        TenantContext::new(TenantId::parse("acme").unwrap(), backend.clone())
    }

    #[tokio::test]
    async fn test_creates_table_and_index() {
        let backend = MemoryBackend::new();
        let layout = KeySetLayout::new("svc");
        let ctx = context(&backend);

        ensure_schema(&ctx, &layout).await.expect("ensure");

        let table = backend.get(&layout.table_schema_key(ctx.tenant())).await.unwrap().unwrap();
        let table = SchemaDescriptor::decode(&table).unwrap();
        assert_eq!(table, SchemaDescriptor::table(&layout));
        assert_eq!(table.columns.len(), 9);

        let index = backend.get(&layout.index_schema_key(ctx.tenant())).await.unwrap().unwrap();
        let index = SchemaDescriptor::decode(&index).unwrap();
        assert_eq!(index.on_table.as_deref(), Some("svc_authorization_v1_data"));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let backend = MemoryBackend::new();
        let layout = KeySetLayout::new("svc");
        let ctx = context(&backend);

        ensure_schema(&ctx, &layout).await.expect("first");
        let before = backend.len();
        ensure_schema(&ctx, &layout).await.expect("second");
        assert_eq!(backend.len(), before);
    }

    #[tokio::test]
    async fn test_concurrent_creates_all_succeed() {
        let backend = MemoryBackend::new();
        let layout = KeySetLayout::new("svc");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = context(&backend);
                let layout = layout.clone();
                tokio::spawn(async move { ensure_schema(&ctx, &layout).await })
            })
            .collect();

        for handle in handles {
            handle.await.expect("join").expect("ensure");
        }
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn test_other_schema_version_is_rejected() {
        let backend = MemoryBackend::new();
        let layout = KeySetLayout::new("svc");
        let ctx = context(&backend);

        let mut old = SchemaDescriptor::table(&layout);
        old.schema_version = 0;
        backend.set(layout.table_schema_key(ctx.tenant()), old.encode().unwrap()).await.unwrap();

        let err = ensure_schema(&ctx, &layout).await.unwrap_err();
        assert!(matches!(
            err,
            KeySetError::SchemaMismatch { expected: SCHEMA_VERSION, found: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_tenants_get_separate_schema_objects() {
        let backend = MemoryBackend::new();
        let layout = KeySetLayout::new("svc");

        ensure_schema(&context(&backend), &layout).await.unwrap();
        let globex = TenantContext::new(TenantId::parse("globex").unwrap(), backend.clone());
        ensure_schema(&globex, &layout).await.unwrap();

        assert_eq!(backend.len(), 4);
    }
}
