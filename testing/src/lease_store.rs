//! In-memory lease-capable key-value store.
//!
//! Provides fast, deterministic testing infrastructure for the token store:
//! - Leases expire on `tokio::time::Instant`, so tests can use a paused clock
//! - Expired leases are purged lazily on every call and by an optional
//!   background sweeper ([`InMemoryLeaseStore::spawn_sweeper`])
//! - Failures can be injected (unavailable store, aborted batch, latency)

use oauth_lease_store_core::{LeaseId, LeaseKvStore, PutOp, Result, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    lease: Option<LeaseId>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    leases: HashMap<LeaseId, Instant>,
    next_lease: i64,
    unavailable: bool,
    fail_next_commit: bool,
    latency: Duration,
}

impl Inner {
    /// Drop expired leases and every key attached to them.
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<LeaseId> = self
            .leases
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        if expired.is_empty() {
            return 0;
        }

        for id in &expired {
            self.leases.remove(id);
        }

        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.lease.is_none_or(|lease| !expired.contains(&lease)));
        before - self.entries.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(StoreError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn check_lease(&self, lease: Option<LeaseId>) -> Result<()> {
        match lease {
            Some(id) if !self.leases.contains_key(&id) => Err(StoreError::TransactionAborted(
                format!("lease {id} not found"),
            )),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, op: PutOp) {
        self.entries.insert(
            op.key,
            Entry {
                value: op.value,
                lease: op.lease,
            },
        );
    }
}

/// In-memory lease store for fast, deterministic testing.
///
/// Clones share the same data, like clones of a real client share a
/// connection pool.
///
/// # Example
///
/// ```
/// use oauth_lease_store_core::{LeaseKvStore, PutOp};
/// use oauth_lease_store_testing::InMemoryLeaseStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryLeaseStore::new();
///
/// let lease = store.grant_lease(5).await?;
/// store.put(PutOp::new("code", b"record".to_vec()).with_lease(lease)).await?;
///
/// assert!(store.contains_key("code"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryLeaseStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryLeaseStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait out the configured latency.
    async fn delay(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Lock for a store call, purging expired leases first.
    fn enter(&self) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.check_available()?;
        inner.purge_expired(Instant::now());
        Ok(inner)
    }

    /// Start a background task that purges expired leases every `period`.
    ///
    /// The task stops on its own once every handle to the store is dropped.
    #[must_use]
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .purge_expired(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, "Lease sweep removed expired keys");
                }
            }
        })
    }

    /// Purge expired leases now. Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    /// Make every subsequent call fail with `StoreUnavailable` (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Make the next `commit_batch` fail with `TransactionAborted`.
    pub fn fail_next_commit(&self) {
        self.lock().fail_next_commit = true;
    }

    /// Delay every call by `latency` before it touches the data.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Check if a live key exists, without going through the async API.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let mut inner = self.lock();
        inner.purge_expired(Instant::now());
        inner.entries.contains_key(key)
    }

    /// All live keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.purge_expired(Instant::now());
        let mut keys: Vec<String> = inner.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether the store holds no live key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw number of keys held, including keys whose lease has expired but
    /// has not been purged yet.
    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Number of leases that have not expired.
    #[must_use]
    pub fn lease_count(&self) -> usize {
        let mut inner = self.lock();
        inner.purge_expired(Instant::now());
        inner.leases.len()
    }

    /// Time left before `key` expires.
    ///
    /// `None` if the key does not exist or is not bound to a lease.
    #[must_use]
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.purge_expired(now);
        let lease = inner.entries.get(key)?.lease?;
        inner
            .leases
            .get(&lease)
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

impl LeaseKvStore for InMemoryLeaseStore {
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId> {
        self.delay().await;
        let mut inner = self.enter()?;
        if ttl_seconds <= 0 {
            return Err(StoreError::InvalidTtl { ttl_seconds });
        }

        inner.next_lease += 1;
        let id = LeaseId(inner.next_lease);
        #[allow(clippy::cast_sign_loss)] // Checked positive above
        let ttl = Duration::from_secs(ttl_seconds as u64);
        inner.leases.insert(id, Instant::now() + ttl);
        Ok(id)
    }

    async fn put(&self, op: PutOp) -> Result<()> {
        self.delay().await;
        let mut inner = self.enter()?;
        inner.check_lease(op.lease)?;
        inner.apply(op);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.delay().await;
        let inner = self.enter()?;
        Ok(inner.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.delay().await;
        let inner = self.enter()?;
        Ok(inner.entries.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delay().await;
        let mut inner = self.enter()?;
        inner.entries.remove(key);
        Ok(())
    }

    async fn commit_batch(&self, ops: Vec<PutOp>) -> Result<()> {
        self.delay().await;
        let mut inner = self.enter()?;

        if std::mem::take(&mut inner.fail_next_commit) {
            return Err(StoreError::TransactionAborted(
                "injected batch failure".to_string(),
            ));
        }

        // Validate everything before the first write.
        for op in &ops {
            inner.check_lease(op.lease)?;
        }
        for op in ops {
            inner.apply(op);
        }
        Ok(())
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryLeaseStore::new();

        store.put(PutOp::new("k", b"v".to_vec())).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(store.exists("k").await.unwrap());

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Deleting again is fine
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_non_positive_lease_rejected() {
        let store = InMemoryLeaseStore::new();

        assert_eq!(
            store.grant_lease(0).await.unwrap_err(),
            StoreError::InvalidTtl { ttl_seconds: 0 }
        );
        assert_eq!(
            store.grant_lease(-1).await.unwrap_err(),
            StoreError::InvalidTtl { ttl_seconds: -1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry_removes_attached_keys() {
        let store = InMemoryLeaseStore::new();
        let lease = store.grant_lease(5).await.unwrap();

        store
            .put(PutOp::new("leased", b"1".to_vec()).with_lease(lease))
            .await
            .unwrap();
        store.put(PutOp::new("plain", b"2".to_vec())).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.contains_key("leased"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("leased").await.unwrap(), None);
        assert_eq!(store.get("plain").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.lease_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_without_reads() {
        let store = InMemoryLeaseStore::new();
        let _sweeper = store.spawn_sweeper(Duration::from_millis(500));
        let lease = store.grant_lease(1).await.unwrap();
        store
            .put(PutOp::new("leased", b"1".to_vec()).with_lease(lease))
            .await
            .unwrap();
        assert_eq!(store.raw_len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.raw_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_with_expired_lease_aborts() {
        let store = InMemoryLeaseStore::new();
        let lease = store.grant_lease(1).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        let err = store
            .put(PutOp::new("k", b"v".to_vec()).with_lease(lease))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::TransactionAborted(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = InMemoryLeaseStore::new();
        let ops = vec![
            PutOp::new("a", b"1".to_vec()),
            PutOp::new("b", b"2".to_vec()).with_lease(LeaseId(999)),
        ];

        let err = store.commit_batch(ops).await.unwrap_err();

        assert!(matches!(err, StoreError::TransactionAborted(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_injected_commit_failure_is_one_shot() {
        let store = InMemoryLeaseStore::new();
        store.fail_next_commit();

        assert!(store.commit_batch(vec![PutOp::new("a", b"1".to_vec())]).await.is_err());
        assert!(store.is_empty());

        store.commit_batch(vec![PutOp::new("a", b"1".to_vec())]).await.unwrap();
        assert_eq!(store.keys(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryLeaseStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.get("k").await.unwrap_err(),
            StoreError::StoreUnavailable(_)
        ));
        assert!(matches!(
            store.grant_lease(5).await.unwrap_err(),
            StoreError::StoreUnavailable(_)
        ));

        store.set_unavailable(false);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_ttl_tracks_lease() {
        let store = InMemoryLeaseStore::new();
        let lease = store.grant_lease(10).await.unwrap();
        store
            .put(PutOp::new("k", b"v".to_vec()).with_lease(lease))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(store.remaining_ttl("k"), Some(Duration::from_secs(7)));
        assert_eq!(store.remaining_ttl("missing"), None);
    }
}
