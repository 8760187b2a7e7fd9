//! Token record store: credential indexing and lifecycle consistency.
//!
//! # Physical layout
//!
//! One logical [`TokenRecord`] is stored as up to four physical keys, all
//! namespaced through [`KeyNamespace::wrap`]:
//!
//! | Key | Value | Lease |
//! |---|---|---|
//! | `ns + code` | encoded record | code validity |
//! | `ns + basic_id` | encoded record | none |
//! | `ns + access` | `basic_id` | access validity, capped at refresh remaining |
//! | `ns + refresh` | `basic_id` | refresh remaining validity |
//!
//! A record is stored either under its authorization code, or under a fresh
//! `basic_id` reachable through the access/refresh index keys. Never both.
//!
//! # Creation
//!
//! Index keys and the record blob are written in a single atomic batch, so a
//! reader that resolves an index key to a `basic_id` always finds the blob.
//!
//! # Revocation
//!
//! Removing an access or refresh token deletes its index key, then deletes the
//! blob only if the sibling index key is gone too.
//!
//! ## Known race
//!
//! The sibling check and the blob delete are separate round trips. Two
//! concurrent removals of the access and refresh tokens of one record can each
//! see the other's index as still present and both keep the blob. A sibling
//! lease that expires between the check and the return has the same effect.
//! The orphaned blob is no longer reachable through any index and stays until
//! an operator sweep removes it. This is accepted: index leases bound how long
//! a live credential can point at stale data, and no distributed lock is taken.

use crate::codec::{JsonCodec, RecordCodec};
use crate::config::StoreConfig;
use crate::environment::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::kv::{LeaseKvStore, PutOp};
use crate::lease::LeaseCoordinator;
use crate::namespace::KeyNamespace;
use crate::record::TokenRecord;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Token storage as seen by an authorization server.
///
/// # Implementation Notes
///
/// - Lookups of missing or expired credentials return `Ok(None)`
/// - Removals of missing credentials succeed (idempotent)
/// - `create` is NOT idempotent: each call mints a new record identity, so it
///   must not be retried blindly after an ambiguous failure
pub trait TokenStore: Send + Sync {
    /// Store a newly issued grant.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The record carries neither a code nor an access token
    /// - A lease cannot be granted (non-positive TTL, store unreachable)
    /// - The record cannot be encoded
    /// - The atomic commit is aborted
    fn create(&self, record: &TokenRecord) -> impl Future<Output = Result<()>> + Send;

    /// Look up a grant by authorization code.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable or the record cannot be decoded.
    fn get_by_code(&self, code: &str)
    -> impl Future<Output = Result<Option<TokenRecord>>> + Send;

    /// Look up a grant by access token.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable or the record cannot be decoded.
    fn get_by_access(
        &self,
        access: &str,
    ) -> impl Future<Output = Result<Option<TokenRecord>>> + Send;

    /// Look up a grant by refresh token.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable or the record cannot be decoded.
    fn get_by_refresh(
        &self,
        refresh: &str,
    ) -> impl Future<Output = Result<Option<TokenRecord>>> + Send;

    /// Revoke an authorization code.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable.
    fn remove_by_code(&self, code: &str) -> impl Future<Output = Result<()>> + Send;

    /// Revoke an access token.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable or the record cannot be decoded.
    fn remove_by_access(&self, access: &str) -> impl Future<Output = Result<()>> + Send;

    /// Revoke a refresh token.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable or the record cannot be decoded.
    fn remove_by_refresh(&self, refresh: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Which index key triggered a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexKind {
    Access,
    Refresh,
}

impl IndexKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Token store over a lease-capable key-value backend.
///
/// The backend is owned explicitly and released with [`TokenRecordStore::close`].
pub struct TokenRecordStore<S, C = JsonCodec, K = SystemClock> {
    backend: S,
    namespace: KeyNamespace,
    codec: C,
    clock: K,
    operation_timeout: Option<Duration>,
}

impl<S: LeaseKvStore> TokenRecordStore<S> {
    /// Create a store using the JSON codec and the system clock.
    #[must_use]
    pub fn new(backend: S, config: StoreConfig) -> Self {
        Self {
            backend,
            namespace: KeyNamespace::new(config.namespace),
            codec: JsonCodec,
            clock: SystemClock,
            operation_timeout: config.operation_timeout,
        }
    }
}

impl<S, C, K> TokenRecordStore<S, C, K>
where
    S: LeaseKvStore,
    C: RecordCodec,
    K: Clock,
{
    /// Replace the record codec.
    #[must_use]
    pub fn with_codec<C2: RecordCodec>(self, codec: C2) -> TokenRecordStore<S, C2, K> {
        TokenRecordStore {
            backend: self.backend,
            namespace: self.namespace,
            codec,
            clock: self.clock,
            operation_timeout: self.operation_timeout,
        }
    }

    /// Replace the clock used to compute remaining refresh validity.
    #[must_use]
    pub fn with_clock<K2: Clock>(self, clock: K2) -> TokenRecordStore<S, C, K2> {
        TokenRecordStore {
            backend: self.backend,
            namespace: self.namespace,
            codec: self.codec,
            clock,
            operation_timeout: self.operation_timeout,
        }
    }

    /// The key namespace applied to every physical key.
    #[must_use]
    pub const fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// The backing key-value store.
    #[must_use]
    pub const fn backend(&self) -> &S {
        &self.backend
    }

    /// Release the backing store's connections.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails to shut down cleanly.
    pub async fn close(self) -> Result<()> {
        tracing::info!(namespace = %self.namespace, "Closing token record store");
        self.backend.close().await
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                tracing::warn!(operation, timeout = ?limit, "Token store deadline exceeded");
                StoreError::DeadlineExceeded { operation }
            })?,
            None => fut.await,
        }
    }

    async fn create_record(&self, record: &TokenRecord) -> Result<()> {
        if let Some(code) = record.code() {
            let value = self.codec.encode(record)?;
            let lease = LeaseCoordinator::new(&self.backend)
                .acquire(code.validity())
                .await?;

            self.backend
                .put(PutOp::new(self.namespace.wrap(&code.value), value).with_lease(lease.id))
                .await?;

            metrics::counter!("token_store.created", "branch" => "code").increment(1);
            tracing::info!(
                client_id = %record.client_id,
                ttl_seconds = lease.ttl_seconds,
                "Stored authorization code record"
            );
            return Ok(());
        }

        let Some(access) = record.access() else {
            return Err(StoreError::InvalidRecord(
                "record carries neither an authorization code nor an access token".to_string(),
            ));
        };

        let value = self.codec.encode(record)?;
        let basic_id = Uuid::new_v4().to_string();

        let refresh = record.refresh();
        let refresh_ttl = refresh.map(|r| r.remaining(self.clock.now()));
        let mut access_ttl = access.validity();
        if let Some(refresh_ttl) = refresh_ttl {
            access_ttl = access_ttl.min(refresh_ttl);
        }

        let leases = LeaseCoordinator::new(&self.backend);
        let access_lease = leases.acquire(access_ttl).await?;

        let mut ops = Vec::with_capacity(3);
        ops.push(
            PutOp::new(self.namespace.wrap(&access.value), basic_id.clone().into_bytes())
                .with_lease(access_lease.id),
        );

        let mut refresh_ttl_seconds = None;
        if let (Some(refresh), Some(refresh_ttl)) = (refresh, refresh_ttl) {
            let refresh_lease = leases.acquire(refresh_ttl).await?;
            refresh_ttl_seconds = Some(refresh_lease.ttl_seconds);
            ops.push(
                PutOp::new(self.namespace.wrap(&refresh.value), basic_id.clone().into_bytes())
                    .with_lease(refresh_lease.id),
            );
        }

        ops.push(PutOp::new(self.namespace.wrap(&basic_id), value));

        if let Err(e) = self.backend.commit_batch(ops).await {
            metrics::counter!("token_store.batch.aborted").increment(1);
            tracing::warn!(basic_id = %basic_id, error = %e, "Token record batch commit failed");
            return Err(e);
        }

        metrics::counter!("token_store.created", "branch" => "access").increment(1);
        tracing::info!(
            client_id = %record.client_id,
            basic_id = %basic_id,
            access_ttl_seconds = access_lease.ttl_seconds,
            refresh_ttl_seconds = ?refresh_ttl_seconds,
            "Stored access token record atomically"
        );

        Ok(())
    }

    /// Resolve an index key to the record's `basic_id`.
    async fn get_basic_id(&self, credential: &str) -> Result<Option<String>> {
        let Some(bytes) = self.backend.get(&self.namespace.wrap(credential)).await? else {
            return Ok(None);
        };

        let basic_id = String::from_utf8(bytes)
            .map_err(|e| StoreError::SerializationFailure(format!("Invalid basic ID: {e}")))?;

        Ok(Some(basic_id).filter(|id| !id.is_empty()))
    }

    async fn get_record(&self, key: &str) -> Result<Option<TokenRecord>> {
        match self.backend.get(&self.namespace.wrap(key)).await? {
            Some(bytes) => self.codec.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn get_by_index(&self, credential: &str) -> Result<Option<TokenRecord>> {
        let Some(basic_id) = self.get_basic_id(credential).await? else {
            return Ok(None);
        };

        // Missing blob is a valid transient state (concurrent cascade).
        self.get_record(&basic_id).await
    }

    async fn remove_token(&self, credential: &str, kind: IndexKind) -> Result<()> {
        let Some(basic_id) = self.get_basic_id(credential).await? else {
            return Ok(());
        };

        self.backend.delete(&self.namespace.wrap(credential)).await?;
        metrics::counter!("token_store.removed", "kind" => kind.as_str()).increment(1);

        let Some(record) = self.get_record(&basic_id).await? else {
            return Ok(());
        };

        let sibling = match kind {
            IndexKind::Access => record.refresh(),
            IndexKind::Refresh => record.access(),
        };
        let Some(sibling) = sibling else {
            return Ok(());
        };

        if self.backend.exists(&self.namespace.wrap(&sibling.value)).await? {
            metrics::counter!("token_store.cascade.blob_retained").increment(1);
            tracing::debug!(
                basic_id = %basic_id,
                kind = kind.as_str(),
                "Sibling index still live, keeping record"
            );
            return Ok(());
        }

        self.backend.delete(&self.namespace.wrap(&basic_id)).await?;

        metrics::counter!("token_store.cascade.blob_removed").increment(1);
        tracing::info!(
            basic_id = %basic_id,
            kind = kind.as_str(),
            "Removed unreachable token record"
        );

        Ok(())
    }
}

impl<S, C, K> TokenStore for TokenRecordStore<S, C, K>
where
    S: LeaseKvStore,
    C: RecordCodec,
    K: Clock,
{
    async fn create(&self, record: &TokenRecord) -> Result<()> {
        self.with_deadline("create", self.create_record(record)).await
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<TokenRecord>> {
        tracing::debug!("Looking up record by authorization code");
        self.with_deadline("get_by_code", self.get_record(code)).await
    }

    async fn get_by_access(&self, access: &str) -> Result<Option<TokenRecord>> {
        tracing::debug!("Looking up record by access token");
        self.with_deadline("get_by_access", self.get_by_index(access))
            .await
    }

    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<TokenRecord>> {
        tracing::debug!("Looking up record by refresh token");
        self.with_deadline("get_by_refresh", self.get_by_index(refresh))
            .await
    }

    async fn remove_by_code(&self, code: &str) -> Result<()> {
        self.with_deadline("remove_by_code", async {
            self.backend.delete(&self.namespace.wrap(code)).await?;
            metrics::counter!("token_store.removed", "kind" => "code").increment(1);
            tracing::info!("Removed authorization code record");
            Ok(())
        })
        .await
    }

    async fn remove_by_access(&self, access: &str) -> Result<()> {
        self.with_deadline("remove_by_access", self.remove_token(access, IndexKind::Access))
            .await
    }

    async fn remove_by_refresh(&self, refresh: &str) -> Result<()> {
        self.with_deadline("remove_by_refresh", self.remove_token(refresh, IndexKind::Refresh))
            .await
    }
}
