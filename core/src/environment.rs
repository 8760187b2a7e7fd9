//! Injected dependencies of the token record store.

use chrono::{DateTime, Utc};

/// Clock abstraction for deterministic time in tests.
///
/// The store reads the clock once per `create` to compute how much validity
/// the refresh token has left.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
