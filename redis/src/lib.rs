//! # OAuth Lease Store Redis
//!
//! Redis implementation of [`LeaseKvStore`](oauth_lease_store_core::LeaseKvStore).
//!
//! Leases are TTL-bound marker keys; leased writes and batches run as Lua
//! scripts so they are all-or-nothing on the server. See [`store`] for the
//! key layout.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod store;

pub use config::RedisConfig;
pub use store::RedisLeaseStore;
