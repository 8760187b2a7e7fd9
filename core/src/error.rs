//! Error types for token record storage.

use thiserror::Error;

/// Result type alias for token store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failure modes of the token record store and of the backing key-value store.
///
/// Absence of a key is never represented here. Lookups return `Ok(None)` and
/// removals of missing keys return `Ok(())`, since keys legitimately expire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached (network, connection, I/O).
    ///
    /// Surfaced verbatim to the caller. The store never retries internally.
    #[error("Backing store unavailable: {0}")]
    StoreUnavailable(String),

    /// A lease was requested with a non-positive time-to-live.
    #[error("Invalid lease TTL: {ttl_seconds}s (must be > 0)")]
    InvalidTtl {
        /// The rejected TTL in whole seconds
        ttl_seconds: i64,
    },

    /// The record codec could not encode or decode a token record.
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// The atomic multi-key commit was rejected. No partial state was written.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// The configured per-operation deadline elapsed before the store answered.
    #[error("Deadline exceeded during {operation}")]
    DeadlineExceeded {
        /// Name of the operation that timed out
        operation: &'static str,
    },

    /// The record cannot be stored because it carries no usable credential.
    #[error("Invalid token record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Whether the caller may retry the failed operation.
    ///
    /// An aborted batch leaves nothing behind, so `create` can be retried after
    /// one. Connectivity failures and deadlines are ambiguous for `create`
    /// (the commit may have landed) and are reported as non-transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransactionAborted(_))
    }
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// An environment variable could not be parsed.
    #[error("Failed to parse {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Why parsing failed
        reason: String,
    },

    /// The configuration is syntactically valid but unusable.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_aborted_transactions_are_transient() {
        assert!(StoreError::TransactionAborted("lease missing".into()).is_transient());
        assert!(!StoreError::StoreUnavailable("refused".into()).is_transient());
        assert!(!StoreError::DeadlineExceeded { operation: "create" }.is_transient());
        assert!(!StoreError::InvalidTtl { ttl_seconds: 0 }.is_transient());
    }

    #[test]
    fn display_includes_context() {
        let err = StoreError::InvalidTtl { ttl_seconds: -3 };
        assert_eq!(err.to_string(), "Invalid lease TTL: -3s (must be > 0)");
    }
}
