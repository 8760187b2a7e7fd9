//! # OAuth Lease Store Core
//!
//! Token persistence for an OAuth2 authorization server on top of a
//! lease-capable key-value store.
//!
//! Authorization codes, access tokens and refresh tokens are stored so that
//! their expirations follow the store's native leases, and so that revoking one
//! credential keeps its siblings consistent.
//!
//! ## Components
//!
//! - **Key Namespacer** ([`KeyNamespace`]): prefixes every physical key
//! - **Lease Coordinator** ([`LeaseCoordinator`]): grants time-bound leases
//! - **Transactional Writer** ([`TokenStore::create`]): atomic multi-key put
//! - **Cascading Remover** ([`TokenStore::remove_by_access`] and friends)
//! - **Record Codec** ([`RecordCodec`]): symmetric record encoding
//!
//! ## Example
//!
//! ```ignore
//! use oauth_lease_store_core::{StoreConfig, TokenRecord, TokenRecordStore, TokenStore};
//! use oauth_lease_store_redis::RedisLeaseStore;
//!
//! let backend = RedisLeaseStore::new("redis://127.0.0.1:6379").await?;
//! let store = TokenRecordStore::new(backend, StoreConfig::new().with_namespace("oauth:"));
//!
//! let record = TokenRecord::new("client-1", "user-1")
//!     .with_access("access-token", Utc::now(), Duration::from_secs(3600))
//!     .with_refresh("refresh-token", Utc::now(), Duration::from_secs(86400));
//! store.create(&record).await?;
//!
//! let found = store.get_by_refresh("refresh-token").await?;
//! assert_eq!(found.map(|r| r.user_id), Some("user-1".to_string()));
//!
//! store.close().await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod codec;
pub mod config;
pub mod environment;
pub mod error;
pub mod kv;
pub mod lease;
pub mod namespace;
pub mod record;
pub mod store;

// Re-export main types for convenience
pub use codec::{BincodeCodec, JsonCodec, RecordCodec};
pub use config::StoreConfig;
pub use environment::{Clock, SystemClock};
pub use error::{ConfigError, Result, StoreError};
pub use kv::{LeaseId, LeaseKvStore, PutOp};
pub use lease::{Lease, LeaseCoordinator};
pub use namespace::KeyNamespace;
pub use record::{IssuedCredential, TokenRecord};
pub use store::{TokenRecordStore, TokenStore};
