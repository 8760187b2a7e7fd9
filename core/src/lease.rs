//! Lease acquisition.
//!
//! Validity durations are converted to whole seconds, rounding any sub-second
//! remainder up, so a key never expires earlier than its credential.

use crate::error::{Result, StoreError};
use crate::kv::{LeaseId, LeaseKvStore};
use chrono::TimeDelta;

/// A granted lease together with the TTL it was granted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    /// Store-assigned identifier.
    pub id: LeaseId,

    /// Granted TTL in whole seconds.
    pub ttl_seconds: i64,
}

/// Requests leases from the backing store.
#[derive(Debug)]
pub struct LeaseCoordinator<'a, S> {
    store: &'a S,
}

impl<'a, S: LeaseKvStore> LeaseCoordinator<'a, S> {
    /// Create a coordinator over `store`.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Acquire a lease that expires after `ttl`.
    ///
    /// Non-positive TTLs are rejected here, before any round trip.
    ///
    /// # Errors
    ///
    /// - `InvalidTtl` if `ttl` rounds to zero or less
    /// - `StoreUnavailable` if the store cannot be reached
    pub async fn acquire(&self, ttl: TimeDelta) -> Result<Lease> {
        let ttl_seconds = ttl_seconds(ttl);
        if ttl_seconds <= 0 {
            return Err(StoreError::InvalidTtl { ttl_seconds });
        }

        let id = self.store.grant_lease(ttl_seconds).await?;

        tracing::debug!(lease_id = %id, ttl_seconds, "Granted lease");

        Ok(Lease { id, ttl_seconds })
    }
}

/// Whole seconds in `ttl`, rounding a positive sub-second remainder up.
#[must_use]
pub fn ttl_seconds(ttl: TimeDelta) -> i64 {
    let seconds = ttl.num_seconds();
    if ttl.subsec_nanos() > 0 {
        seconds.saturating_add(1)
    } else {
        seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whole_seconds_are_kept() {
        assert_eq!(ttl_seconds(TimeDelta::seconds(10)), 10);
        assert_eq!(ttl_seconds(TimeDelta::zero()), 0);
        assert_eq!(ttl_seconds(TimeDelta::seconds(-4)), -4);
    }

    #[test]
    fn positive_fractions_round_up() {
        assert_eq!(ttl_seconds(TimeDelta::milliseconds(1_500)), 2);
        assert_eq!(ttl_seconds(TimeDelta::milliseconds(1)), 1);
    }

    #[test]
    fn negative_fractions_round_toward_zero() {
        // -0.5s truncates to 0 and stays invalid.
        assert_eq!(ttl_seconds(TimeDelta::milliseconds(-500)), 0);
        assert_eq!(ttl_seconds(TimeDelta::milliseconds(-1_500)), -1);
    }

    proptest! {
        #[test]
        fn rounded_ttl_never_shortens_validity(ms in 1i64..10_000_000) {
            let ttl = TimeDelta::milliseconds(ms);
            prop_assert!(TimeDelta::seconds(ttl_seconds(ttl)) >= ttl);
            prop_assert!(ttl_seconds(ttl) > 0);
        }

        #[test]
        fn clamp_survives_rounding(access_ms in 1i64..1_000_000, refresh_ms in 1i64..1_000_000) {
            let access = TimeDelta::milliseconds(access_ms).min(TimeDelta::milliseconds(refresh_ms));
            prop_assert!(ttl_seconds(access) <= ttl_seconds(TimeDelta::milliseconds(refresh_ms)));
        }
    }
}
