//! The key-set store: writer, invalidator, reader, and latest-version resolver.
//!
//! Each tenant's key sets live in one table row per version plus a validity
//! index that holds an entry for every valid row (see [`KeySetLayout`]). A
//! write or invalidation updates row and index in one transaction whose row
//! write is a compare-and-set against the value read at the start of the
//! attempt; a conflict re-runs the attempt.
//!
//! Retired key sets are indistinguishable from absent ones to readers, apart
//! from a warning in the logs.

use std::{sync::Arc, time::Instant};

use keyset_storage::{StorageBackend, StorageError, prefix_range};

use crate::{
    config::KeySetStoreConfig,
    error::{ConfigError, KeySetError, KeySetResult},
    keypair::KeyPairSource,
    layout::{KeySetLayout, unescape_segment},
    metrics::{KeySetErrorKind, KeySetMetrics, Operation},
    record::KeySetRecord,
    retry::with_cas_retry,
    schema,
    signature::{KeyPairHolder, Signature, SignatureSet},
    tenant::TenantContext,
    version,
};

/// Versioned store of per-tenant key sets.
///
/// The store holds no per-tenant state; every operation takes the tenant's
/// [`TenantContext`]. One store may serve any number of tenants concurrently.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use keyset_storage::{MemoryBackend, TenantId};
/// use keyset_store::{KeySetStore, KeySetStoreConfig, RsaKeyPairSource, Signature, TenantContext};
/// use num_bigint::BigUint;
///
/// # tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap().block_on(async {
/// let config = KeySetStoreConfig::builder().service_name("billing").key_bits(1024).build()?;
/// let key_source = Arc::new(RsaKeyPairSource::from_config(&config));
/// let store = KeySetStore::new(config, key_source)?;
/// let ctx = TenantContext::new(TenantId::parse("acme")?, MemoryBackend::new());
///
/// let identity_manager = Signature::new(BigUint::from(3233u32), BigUint::from(17u32));
/// let application = store.create_signature_set(&ctx, "2023-01-01", &identity_manager).await?;
///
/// let latest = store.get_latest_application_signature(&ctx).await?;
/// assert_eq!(latest, Some(application));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # }).unwrap();
/// ```
pub struct KeySetStore {
    config: KeySetStoreConfig,
    layout: KeySetLayout,
    key_source: Arc<dyn KeyPairSource>,
    metrics: Option<KeySetMetrics>,
}

impl std::fmt::Debug for KeySetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetStore")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl KeySetStore {
    /// Creates a store that generates application key pairs with `key_source`.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Config`] if `config` fails validation (possible
    /// when it was deserialized rather than built), or if `key_source`
    /// generates moduli of a size other than the configured `key_bits`.
    pub fn new(config: KeySetStoreConfig, key_source: Arc<dyn KeyPairSource>) -> KeySetResult<Self> {
        config.validate()?;
        if let Some(bits) = key_source.modulus_bits()
            && bits != config.key_bits()
        {
            return Err(ConfigError::Invalid {
                field: "key_bits",
                reason: format!(
                    "key source generates {bits}-bit moduli but {} bits are configured",
                    config.key_bits()
                ),
            }
            .into());
        }
        let layout = KeySetLayout::new(config.service_name());
        Ok(Self { config, layout, key_source, metrics: None })
    }

    /// Enables operation metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: KeySetMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the metrics collector, if enabled.
    #[must_use]
    pub fn metrics(&self) -> Option<&KeySetMetrics> {
        self.metrics.as_ref()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &KeySetStoreConfig {
        &self.config
    }

    /// Returns the table and index naming for this store.
    #[must_use]
    pub fn layout(&self) -> &KeySetLayout {
        &self.layout
    }

    /// Creates the key-set table and validity index for the tenant if absent.
    ///
    /// Idempotent and safe under concurrency. [`create_signature_set`]
    /// calls this itself, so explicit calls are only needed to provision a
    /// tenant ahead of its first write.
    ///
    /// [`create_signature_set`]: Self::create_signature_set
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Storage`] if the data store fails, or
    /// [`KeySetError::SchemaMismatch`] if an incompatible schema exists.
    pub async fn ensure_schema<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
    ) -> KeySetResult<()> {
        schema::ensure_schema(ctx, &self.layout).await
    }

    /// Generates a new application key pair and stores it, together with the
    /// identity-manager public key, as the valid key set for `version`.
    ///
    /// An existing row for the same version is replaced, including a retired
    /// one, which becomes valid again. Returns the public half of the new
    /// application key pair.
    ///
    /// # Errors
    ///
    /// - [`KeySetError::InvalidArgument`] for an empty `version`, one rejected
    ///   by the configured policy, or a zero identity-manager modulus or
    ///   exponent. Nothing is written.
    /// - [`KeySetError::KeyGeneration`] if no key pair could be generated.
    /// - [`KeySetError::Storage`] if the data store fails, including
    ///   [`StorageError::CasRetriesExhausted`] under sustained write contention.
    #[tracing::instrument(skip(self, ctx, identity_manager_signature), fields(tenant = %ctx.tenant()))]
    pub async fn create_signature_set<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
        identity_manager_signature: &Signature,
    ) -> KeySetResult<Signature> {
        let start = Instant::now();
        let result = self.create_inner(ctx, version, identity_manager_signature).await;
        self.observe(Operation::Create, start, &result);
        result
    }

    async fn create_inner<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
        identity_manager_signature: &Signature,
    ) -> KeySetResult<Signature> {
        version::validate_for_write(version, self.config.version_policy())?;
        if identity_manager_signature.is_zero() {
            return Err(KeySetError::invalid_argument(
                "identity_manager_signature",
                "modulus and exponent must be non-zero",
            ));
        }

        schema::ensure_schema(ctx, &self.layout).await?;

        if self.config.require_newer_versions()
            && let Some(latest) = self.latest_version(ctx).await?
            && version < latest.as_str()
        {
            return Err(KeySetError::invalid_argument(
                "version",
                format!("'{version}' sorts before the latest valid version '{latest}'"),
            ));
        }

        let key_pair = self.generate_key_pair().await?;
        let encoded = KeySetRecord::new(version, identity_manager_signature, &key_pair).encode()?;
        let row_key = self.layout.row_key(ctx.tenant(), version);
        let index_key = self.layout.index_entry_key(ctx.tenant(), version);

        let previous = with_cas_retry(self.config.cas_retry(), || async {
            let current = ctx.session().get(&row_key).await?;
            let mut txn = ctx.session().transaction().await?;
            txn.compare_and_set(
                row_key.clone(),
                current.as_ref().map(|b| b.to_vec()),
                encoded.clone(),
            )?;
            txn.set(index_key.clone(), Vec::new());
            txn.commit().await?;
            Ok(current)
        })
        .await?;

        match previous.as_deref().map(KeySetRecord::decode) {
            None => tracing::info!(version, "Stored new key set"),
            Some(Ok(old)) if !old.valid => tracing::warn!(
                version,
                retired_at = %old.updated_at,
                "Key set for version '{version}' was retired and has been replaced with a valid one"
            ),
            Some(Ok(_)) => tracing::info!(version, "Replaced existing key set"),
            Some(Err(e)) => {
                tracing::warn!(version, error = %e, "Replaced unreadable key-set row");
            },
        }

        Ok(key_pair.public_signature())
    }

    /// Marks the key set for `version` as retired.
    ///
    /// The row and its key material stay in storage; only the valid flag is
    /// cleared and the index entry removed. Retiring a missing or already
    /// retired version is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Storage`] if the data store fails.
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant()))]
    pub async fn delete_signature_set<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
    ) -> KeySetResult<()> {
        let start = Instant::now();
        let result = self.invalidate_inner(ctx, version).await;
        self.observe(Operation::Invalidate, start, &result);
        result
    }

    async fn invalidate_inner<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
    ) -> KeySetResult<()> {
        let row_key = self.layout.row_key(ctx.tenant(), version);
        let index_key = self.layout.index_entry_key(ctx.tenant(), version);

        let retired = with_cas_retry(self.config.cas_retry(), || async {
            let Some(current) = ctx.session().get(&row_key).await? else {
                return Ok(false);
            };
            let record = KeySetRecord::decode(&current)?;
            if !record.valid {
                return Ok(false);
            }

            let mut txn = ctx.session().transaction().await?;
            txn.compare_and_set(row_key.clone(), Some(current.to_vec()), record.retired().encode()?)?;
            txn.delete(index_key.clone());
            txn.commit().await?;
            Ok(true)
        })
        .await?;

        if retired {
            tracing::info!(version, "Retired key set");
        } else {
            tracing::debug!(version, "No valid key set to retire");
        }
        Ok(())
    }

    /// Returns the application public key for `version`, or `None` if the
    /// version is absent or retired.
    ///
    /// # Errors
    ///
    /// - [`KeySetError::Inconsistent`] if the valid row lacks the key.
    /// - [`KeySetError::Storage`] if the data store fails.
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant()))]
    pub async fn get_application_signature<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
    ) -> KeySetResult<Option<Signature>> {
        let start = Instant::now();
        let result = self
            .read_valid(ctx, version)
            .await
            .and_then(|record| record.map(|r| r.application_signature()).transpose());
        self.observe(Operation::Read, start, &result);
        result
    }

    /// Returns the identity-manager public key for `version`, or `None` if
    /// the version is absent or retired.
    ///
    /// # Errors
    ///
    /// Same as [`get_application_signature`](Self::get_application_signature).
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant()))]
    pub async fn get_identity_manager_signature<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
    ) -> KeySetResult<Option<Signature>> {
        let start = Instant::now();
        let result = self
            .read_valid(ctx, version)
            .await
            .and_then(|record| record.map(|r| r.identity_manager_signature()).transpose());
        self.observe(Operation::Read, start, &result);
        result
    }

    /// Returns both public keys for `version`, or `None` if the version is
    /// absent or retired.
    ///
    /// # Errors
    ///
    /// Same as [`get_application_signature`](Self::get_application_signature).
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant()))]
    pub async fn get_signature_set<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
    ) -> KeySetResult<Option<SignatureSet>> {
        let start = Instant::now();
        let result = self
            .read_valid(ctx, version)
            .await
            .and_then(|record| record.map(|r| r.signature_set()).transpose());
        self.observe(Operation::Read, start, &result);
        result
    }

    /// Returns every valid version for the tenant in ascending lexical order.
    ///
    /// Retired versions are excluded. A tenant with no key sets, or without
    /// a schema yet, yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Storage`] if the data store fails.
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant()))]
    pub async fn get_all_signature_set_key_timestamps<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
    ) -> KeySetResult<Vec<String>> {
        let start = Instant::now();
        let result = self.valid_versions(ctx).await;
        self.observe(Operation::List, start, &result);
        result
    }

    /// Returns the key set of the lexically greatest valid version, or
    /// `None` if the tenant has no valid key set.
    ///
    /// # Errors
    ///
    /// - [`KeySetError::Inconsistent`] if the latest valid row lacks key material.
    /// - [`KeySetError::Storage`] if the data store fails.
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant()))]
    pub async fn get_latest_signature_set<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
    ) -> KeySetResult<Option<SignatureSet>> {
        let start = Instant::now();
        let result = self.latest_record(ctx).await.and_then(|record| {
            record.map(|r| r.signature_set()).transpose()
        });
        self.observe(Operation::List, start, &result);
        result
    }

    /// Returns the application public key of the latest valid version, or
    /// `None` if the tenant has no valid key set.
    ///
    /// # Errors
    ///
    /// Same as [`get_latest_signature_set`](Self::get_latest_signature_set).
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant()))]
    pub async fn get_latest_application_signature<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
    ) -> KeySetResult<Option<Signature>> {
        let start = Instant::now();
        let result = self.latest_record(ctx).await.and_then(|record| {
            record.map(|r| r.application_signature()).transpose()
        });
        self.observe(Operation::List, start, &result);
        result
    }

    /// Reads the row for `version`, hiding retired rows.
    async fn read_valid<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
        version: &str,
    ) -> KeySetResult<Option<KeySetRecord>> {
        let Some(bytes) = ctx.session().get(&self.layout.row_key(ctx.tenant(), version)).await?
        else {
            return Ok(None);
        };

        let record = KeySetRecord::decode(&bytes)?;
        if !record.valid {
            tracing::warn!(
                version,
                "Invalidated keyset for version '{version}' requested. Pretending no keyset exists."
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_retired_read();
            }
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn valid_versions<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
    ) -> KeySetResult<Vec<String>> {
        let prefix = self.layout.index_prefix(ctx.tenant());
        let entries = ctx.session().get_range(prefix_range(&prefix)).await?;

        let mut versions = entries
            .iter()
            .map(|entry| -> KeySetResult<String> {
                let suffix = entry.key.strip_prefix(prefix.as_slice()).ok_or_else(|| {
                    StorageError::internal("range scan returned a key outside the index prefix")
                })?;
                let segment = std::str::from_utf8(suffix).map_err(|e| {
                    StorageError::serialization_with_source("index entry is not valid UTF-8", e)
                })?;
                unescape_segment(segment).ok_or_else(|| {
                    KeySetError::from(StorageError::serialization(format!(
                        "index entry '{segment}' is not a valid escaped version"
                    )))
                })
            })
            .collect::<KeySetResult<Vec<_>>>()?;

        // Escaping changes byte order around '%' and '/'; sort on the versions.
        versions.sort_unstable();
        Ok(versions)
    }

    async fn latest_version<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
    ) -> KeySetResult<Option<String>> {
        Ok(self.valid_versions(ctx).await?.into_iter().max())
    }

    /// Resolves the latest valid version and reads its row.
    ///
    /// If the version is retired between the two steps the result is `None`,
    /// exactly as if the retirement had happened first.
    async fn latest_record<B: StorageBackend>(
        &self,
        ctx: &TenantContext<B>,
    ) -> KeySetResult<Option<KeySetRecord>> {
        let Some(latest) = self.latest_version(ctx).await? else {
            tracing::debug!("No valid key set for tenant");
            return Ok(None);
        };
        tracing::debug!(version = %latest, "Resolved latest valid version");
        self.read_valid(ctx, &latest).await
    }

    async fn generate_key_pair(&self) -> KeySetResult<KeyPairHolder> {
        let source = Arc::clone(&self.key_source);
        tokio::task::spawn_blocking(move || source.create_key_pair())
            .await
            .map_err(|e| KeySetError::key_generation_with_source("key generation task failed", e))?
    }

    fn observe<T>(&self, operation: Operation, start: Instant, result: &KeySetResult<T>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.record(operation, start.elapsed());
        if let Err(e) = result {
            metrics.record_error(KeySetErrorKind::of(e));
        }
    }
}
