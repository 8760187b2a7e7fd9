//! # OAuth Lease Store Testing
//!
//! Testing utilities and helpers for the OAuth lease store.
//!
//! This crate provides:
//! - [`InMemoryLeaseStore`]: a lease-capable key-value store with failure injection
//! - [`FixedClock`]: deterministic time for refresh-validity computations
//! - [`fixtures`]: token records shaped like the ones an authorization server issues
//! - [`init_tracing`]: opt-in log output for test runs
//!
//! ## Example
//!
//! ```ignore
//! use oauth_lease_store_core::{StoreConfig, TokenRecordStore, TokenStore};
//! use oauth_lease_store_testing::{InMemoryLeaseStore, fixtures, test_clock};
//!
//! #[tokio::test]
//! async fn test_refresh_lookup() {
//!     let backend = InMemoryLeaseStore::new();
//!     let store = TokenRecordStore::new(backend, StoreConfig::new()).with_clock(test_clock());
//!
//!     store.create(&fixtures::refresh_record("1_2_1", "1_2_2")).await.unwrap();
//!
//!     assert!(store.get_by_refresh("1_2_2").await.unwrap().is_some());
//! }
//! ```

pub mod lease_store;

pub use lease_store::InMemoryLeaseStore;

use chrono::{DateTime, Utc};
use oauth_lease_store_core::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use oauth_lease_store_testing::mocks::FixedClock;
    /// use oauth_lease_store_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(super::test_epoch())
    }
}

/// Token record fixtures.
///
/// Every credential is issued at [`test_epoch`], so pair these with
/// [`test_clock`] for exact TTLs.
pub mod fixtures {
    use super::test_epoch;
    use oauth_lease_store_core::TokenRecord;
    use std::time::Duration;

    /// Client ID used by every fixture.
    pub const CLIENT_ID: &str = "1";

    /// Redirect URI used by every fixture.
    pub const REDIRECT_URI: &str = "http://localhost/";

    fn base(user_id: &str) -> TokenRecord {
        TokenRecord::new(CLIENT_ID, user_id)
            .with_redirect_uri(REDIRECT_URI)
            .with_scope("all")
    }

    /// Authorization code record valid for 5 seconds.
    #[must_use]
    pub fn code_record(code: &str) -> TokenRecord {
        base("1_1").with_code(code, test_epoch(), Duration::from_secs(5))
    }

    /// Access-only record valid for 5 seconds.
    #[must_use]
    pub fn access_record(access: &str) -> TokenRecord {
        base("1_1").with_access(access, test_epoch(), Duration::from_secs(5))
    }

    /// Access (5 seconds) and refresh (15 seconds) record.
    #[must_use]
    pub fn refresh_record(access: &str, refresh: &str) -> TokenRecord {
        base("1_2")
            .with_access(access, test_epoch(), Duration::from_secs(5))
            .with_refresh(refresh, test_epoch(), Duration::from_secs(15))
    }

    /// Access and refresh record with explicit validities.
    #[must_use]
    pub fn dual_record(
        access: &str,
        access_validity: Duration,
        refresh: &str,
        refresh_validity: Duration,
    ) -> TokenRecord {
        base("1_2")
            .with_access(access, test_epoch(), access_validity)
            .with_refresh(refresh, test_epoch(), refresh_validity)
    }
}

/// Fixed instant every fixture is issued at (2025-01-01 00:00:00 UTC).
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
}

/// Install a `tracing` subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
