//! Lease-capable key-value store contract.
//!
//! This module defines the backing store the token record store is built on.
//! The store is expected to provide:
//!
//! - Per-key consistency for `put` / `get` / `delete`
//! - Time-bound leases: keys attached to a lease are deleted by the store
//!   itself once the lease's TTL elapses
//! - An atomic multi-key commit: every operation in a batch applies, or none do
//!
//! # Implementations
//!
//! - `RedisLeaseStore` (in `oauth-lease-store-redis`): production backend
//! - `InMemoryLeaseStore` (in `oauth-lease-store-testing`): deterministic tests
//!
//! # Cancellation
//!
//! Every method returns a future. Dropping the future cancels the call; callers
//! that need a deadline wrap it in `tokio::time::timeout` (the token record
//! store does this when `StoreConfig::operation_timeout` is set).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Identifier of a lease granted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseId(pub i64);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single write, optionally bound to a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOp {
    /// Physical key (already namespaced).
    pub key: String,

    /// Raw value.
    pub value: Vec<u8>,

    /// Lease the key expires with. `None` keeps the key until deleted.
    pub lease: Option<LeaseId>,
}

impl PutOp {
    /// A write that never expires on its own.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            lease: None,
        }
    }

    /// Bind the write to a lease.
    #[must_use]
    pub const fn with_lease(mut self, lease: LeaseId) -> Self {
        self.lease = Some(lease);
        self
    }
}

/// Lease-capable key-value store.
///
/// # Implementation Notes
///
/// - `grant_lease` MUST reject `ttl_seconds <= 0` with `StoreError::InvalidTtl`
/// - `commit_batch` MUST be all-or-nothing; a rejected batch reports
///   `StoreError::TransactionAborted` and leaves no key behind
/// - A missing key is `Ok(None)` / `Ok(false)`, never an error
/// - Connectivity failures are `StoreError::StoreUnavailable`
pub trait LeaseKvStore: Send + Sync {
    /// Grant a lease that expires after `ttl_seconds`.
    ///
    /// # Errors
    ///
    /// - `InvalidTtl` if `ttl_seconds <= 0`
    /// - `StoreUnavailable` if the store cannot be reached
    fn grant_lease(&self, ttl_seconds: i64) -> impl Future<Output = Result<LeaseId>> + Send;

    /// Write a single key.
    ///
    /// # Errors
    ///
    /// - `StoreUnavailable` if the store cannot be reached
    /// - `TransactionAborted` if the referenced lease no longer exists
    fn put(&self, op: PutOp) -> impl Future<Output = Result<()>> + Send;

    /// Read a key.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be reached.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Check whether a key currently exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be reached.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(key).await?.is_some()) }
    }

    /// Delete a key. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be reached.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Apply every write in `ops` atomically.
    ///
    /// # Errors
    ///
    /// - `TransactionAborted` if the store rejected the batch (nothing applied)
    /// - `StoreUnavailable` if the store cannot be reached
    fn commit_batch(&self, ops: Vec<PutOp>) -> impl Future<Output = Result<()>> + Send;

    /// Release the underlying connections.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if shutting the connection down fails.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}
