//! Redis-backed lease store.
//!
//! # Leases on Redis
//!
//! Redis has per-key TTLs but no leases, so a lease is modelled as a marker
//! key:
//! - **Lease id**: `INCR {lease_prefix}seq`
//! - **Lease marker**: `{lease_prefix}{id}` with `EX ttl_seconds`
//! - **Leased key**: written with `PX` equal to the marker's remaining
//!   `PTTL`, so it expires together with the lease
//!
//! Granting a lease and every leased write run as Lua scripts, so the lease
//! check and the writes that depend on it are atomic on the server. A batch
//! referencing a lease that no longer exists writes nothing.
//!
//! # Example
//!
//! ```no_run
//! use oauth_lease_store_core::{StoreConfig, TokenRecordStore, TokenStore};
//! use oauth_lease_store_redis::{RedisConfig, RedisLeaseStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = RedisLeaseStore::connect(RedisConfig::new("redis://127.0.0.1:6379")).await?;
//! let store = TokenRecordStore::new(backend, StoreConfig::new().with_namespace("oauth:"));
//!
//! let record = store.get_by_refresh("refresh-token").await?;
//! # let _ = record;
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RedisConfig;
use oauth_lease_store_core::{LeaseId, LeaseKvStore, PutOp, Result, StoreError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::sync::Arc;

/// Error code raised by the write script when a lease is gone.
const LEASE_NOT_FOUND: &str = "LEASE_NOT_FOUND";

/// KEYS[1] = sequence key; ARGV[1] = lease prefix, ARGV[2] = ttl seconds.
const GRANT_LEASE_SCRIPT: &str = r"
    local id = redis.call('INCR', KEYS[1])
    redis.call('SET', ARGV[1] .. id, '1', 'EX', ARGV[2])
    return id
";

/// KEYS[i] = target key of op i.
/// ARGV[1] = lease prefix; ARGV[2i] = value of op i; ARGV[2i+1] = lease id or ''.
///
/// Every lease is resolved before the first write.
const WRITE_SCRIPT: &str = r"
    local prefix = ARGV[1]
    local ttls = {}
    for i = 1, #KEYS do
        local lease = ARGV[2 * i + 1]
        if lease ~= '' then
            local pttl = redis.call('PTTL', prefix .. lease)
            if pttl <= 0 then
                return redis.error_reply('LEASE_NOT_FOUND lease ' .. lease .. ' not found')
            end
            ttls[i] = pttl
        else
            ttls[i] = false
        end
    end
    for i = 1, #KEYS do
        if ttls[i] then
            redis.call('SET', KEYS[i], ARGV[2 * i], 'PX', ttls[i])
        else
            redis.call('SET', KEYS[i], ARGV[2 * i])
        end
    end
    return #KEYS
";

/// Map a Redis error onto the store's error contract.
///
/// A missing lease aborts the transaction; everything else means the store
/// could not serve the call.
fn map_redis_error(context: &str, e: &RedisError) -> StoreError {
    let lease_missing =
        e.code() == Some(LEASE_NOT_FOUND) || e.to_string().contains(LEASE_NOT_FOUND);
    if lease_missing {
        return StoreError::TransactionAborted(format!("{context}: {e}"));
    }

    if !(e.is_io_error() || e.is_connection_dropped() || e.is_timeout()) {
        tracing::warn!(error = %e, context, "Unexpected Redis error");
    }
    StoreError::StoreUnavailable(format!("{context}: {e}"))
}

/// `Redis`-based lease store.
///
/// This type is `Clone`; clones share the same `ConnectionManager`
/// (connection pool) and scripts.
#[derive(Clone)]
pub struct RedisLeaseStore {
    conn_manager: ConnectionManager,
    config: Arc<RedisConfig>,
    grant_script: Arc<Script>,
    write_script: Arc<Script>,
}

impl std::fmt::Debug for RedisLeaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLeaseStore")
            .field("lease_key_prefix", &self.config.lease_key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisLeaseStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreUnavailable`] if:
    /// - The configuration is invalid
    /// - The URL is malformed
    /// - Connection to the server or authentication fails
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        config.validate().map_err(|e| {
            StoreError::StoreUnavailable(format!("Invalid Redis configuration: {e}"))
        })?;

        let client = Client::open(config.url.as_str())
            .map_err(|e| map_redis_error("Failed to create Redis client", &e))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("Failed to create Redis connection manager", &e))?;

        tracing::info!(
            lease_key_prefix = %config.lease_key_prefix,
            "RedisLeaseStore initialized successfully"
        );

        Ok(Self {
            conn_manager,
            config: Arc::new(config),
            grant_script: Arc::new(Script::new(GRANT_LEASE_SCRIPT)),
            write_script: Arc::new(Script::new(WRITE_SCRIPT)),
        })
    }

    /// Connect to `redis_url` with the default lease prefix.
    ///
    /// # Errors
    ///
    /// See [`RedisLeaseStore::connect`].
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::connect(RedisConfig::new(redis_url)).await
    }

    /// Configuration this store was built with.
    #[must_use]
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Apply `ops` through the write script.
    async fn write(&self, ops: &[PutOp], context: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let mut invocation = self.write_script.prepare_invoke();
        invocation.arg(&self.config.lease_key_prefix);
        for op in ops {
            invocation
                .key(&op.key)
                .arg(op.value.as_slice())
                .arg(op.lease.map_or_else(String::new, |lease| lease.0.to_string()));
        }

        let written: usize = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(context, &e))?;

        tracing::debug!(written, "Applied Redis write script");
        Ok(())
    }
}

impl LeaseKvStore for RedisLeaseStore {
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId> {
        if ttl_seconds <= 0 {
            return Err(StoreError::InvalidTtl { ttl_seconds });
        }

        let mut conn = self.conn_manager.clone();
        let id: i64 = self
            .grant_script
            .key(self.config.lease_sequence_key())
            .arg(&self.config.lease_key_prefix)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("Failed to grant lease", &e))?;

        tracing::debug!(
            lease_id = id,
            lease_key = %self.config.lease_key(id),
            ttl_seconds,
            "Granted lease"
        );

        Ok(LeaseId(id))
    }

    async fn put(&self, op: PutOp) -> Result<()> {
        if op.lease.is_some() {
            return self.write(std::slice::from_ref(&op), "Failed to put leased key").await;
        }

        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .set(&op.key, op.value)
            .await
            .map_err(|e| map_redis_error("Failed to put key", &e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| map_redis_error("Failed to get key", &e))?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| map_redis_error("Failed to check key existence", &e))?;
        Ok(exists)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| map_redis_error("Failed to delete key", &e))?;
        Ok(())
    }

    async fn commit_batch(&self, ops: Vec<PutOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.write(&ops, "Failed to commit batch").await
    }

    async fn close(self) -> Result<()> {
        // ConnectionManager closes its connection once the last clone drops.
        drop(self);
        tracing::info!("RedisLeaseStore closed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    #[test]
    fn io_errors_are_unavailable() {
        let err = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));

        assert!(matches!(
            map_redis_error("get", &err),
            StoreError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn missing_lease_aborts_transaction() {
        let err = RedisError::from((
            ErrorKind::ExtensionError,
            "LEASE_NOT_FOUND",
            "lease 7 not found".to_string(),
        ));

        let mapped = map_redis_error("commit", &err);

        assert!(matches!(mapped, StoreError::TransactionAborted(_)));
        assert!(mapped.is_transient());
    }

    #[test]
    fn other_server_errors_are_unavailable() {
        let err = RedisError::from((ErrorKind::TypeError, "WRONGTYPE"));

        assert!(matches!(
            map_redis_error("get", &err),
            StoreError::StoreUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn connect_rejects_invalid_config() {
        let err = RedisLeaseStore::connect(RedisConfig::new("http://nowhere"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::StoreUnavailable(_)));
    }
}
