//! Integration tests against a live Redis server.
//!
//! Run with: `docker run -d -p 6379:6379 redis:7-alpine`, then
//! `cargo test -p oauth-lease-store-redis -- --ignored`.
//! `REDIS_URL` overrides the default `redis://127.0.0.1:6379`.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use oauth_lease_store_core::{
    LeaseId, LeaseKvStore, PutOp, StoreConfig, StoreError, TokenRecordStore, TokenStore,
};
use oauth_lease_store_redis::{RedisConfig, RedisLeaseStore};
use oauth_lease_store_testing::{fixtures, init_tracing, test_clock};
use std::time::Duration;
use tokio_test::assert_ok;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Backend with a lease prefix private to the calling test.
async fn backend() -> RedisLeaseStore {
    init_tracing();
    let config = RedisConfig::new(redis_url())
        .with_lease_key_prefix(format!("test:lease:{}:", uuid::Uuid::new_v4()));
    RedisLeaseStore::connect(config).await.unwrap()
}

fn unique_namespace() -> String {
    format!("test:{}:", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn test_leased_put_expires_with_lease() {
    let store = backend().await;
    let key = format!("test:leased:{}", uuid::Uuid::new_v4());

    let lease = store.grant_lease(1).await.unwrap();
    store
        .put(PutOp::new(key.clone(), b"v".to_vec()).with_lease(lease))
        .await
        .unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some(b"v".to_vec()));

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(store.get(&key).await.unwrap(), None);
    assert!(!store.exists(&key).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn test_batch_with_missing_lease_writes_nothing() {
    let store = backend().await;
    let plain = format!("test:plain:{}", uuid::Uuid::new_v4());
    let leased = format!("test:leased:{}", uuid::Uuid::new_v4());

    let err = store
        .commit_batch(vec![
            PutOp::new(plain.clone(), b"1".to_vec()),
            PutOp::new(leased.clone(), b"2".to_vec()).with_lease(LeaseId(i64::MAX)),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::TransactionAborted(_)));
    assert!(!store.exists(&plain).await.unwrap());
    assert!(!store.exists(&leased).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn test_non_positive_lease_rejected() {
    let store = backend().await;

    assert_eq!(
        store.grant_lease(0).await.unwrap_err(),
        StoreError::InvalidTtl { ttl_seconds: 0 }
    );
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn test_token_record_store_on_redis() {
    let store = TokenRecordStore::new(
        backend().await,
        StoreConfig::new().with_namespace(unique_namespace()),
    )
    .with_clock(test_clock());

    store.create(&fixtures::code_record("11_11_11")).await.unwrap();
    store
        .create(&fixtures::refresh_record("1_2_1", "1_2_2"))
        .await
        .unwrap();

    assert!(store.get_by_code("11_11_11").await.unwrap().is_some());
    assert!(store.get_by_access("1_2_1").await.unwrap().is_some());
    assert!(store.get_by_refresh("1_2_2").await.unwrap().is_some());

    store.remove_by_access("1_2_1").await.unwrap();
    assert!(store.get_by_access("1_2_1").await.unwrap().is_none());
    assert!(store.get_by_refresh("1_2_2").await.unwrap().is_some());

    store.remove_by_refresh("1_2_2").await.unwrap();
    assert!(store.get_by_refresh("1_2_2").await.unwrap().is_none());

    assert_ok!(store.remove_by_code("11_11_11").await);
    assert!(store.get_by_code("11_11_11").await.unwrap().is_none());

    assert_ok!(store.close().await);
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn test_access_clamped_to_refresh_on_redis() {
    let store = TokenRecordStore::new(
        backend().await,
        StoreConfig::new().with_namespace(unique_namespace()),
    )
    .with_clock(test_clock());
    let info = fixtures::dual_record("A", Duration::from_secs(100), "R", Duration::from_secs(1));

    store.create(&info).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert!(store.get_by_access("A").await.unwrap().is_none());
    assert!(store.get_by_refresh("R").await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn test_connect_to_unreachable_server() {
    let err = RedisLeaseStore::new("redis://127.0.0.1:1").await.unwrap_err();

    assert!(matches!(err, StoreError::StoreUnavailable(_)));
}
