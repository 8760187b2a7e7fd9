//! Token store configuration.
//!
//! Values come from the application (or the environment via
//! [`StoreConfig::from_env`]); nothing is hardcoded in the store itself.

use crate::error::ConfigError;
use std::time::Duration;

/// Environment variable holding the key namespace prefix.
pub const NAMESPACE_ENV: &str = "TOKEN_STORE_NAMESPACE";

/// Environment variable holding the per-operation deadline in milliseconds.
pub const OPERATION_TIMEOUT_ENV: &str = "TOKEN_STORE_OPERATION_TIMEOUT_MS";

/// Configuration for a `TokenRecordStore`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Prefix prepended to every physical key.
    ///
    /// Default: empty
    pub namespace: String,

    /// Deadline applied to each public store operation.
    ///
    /// Default: none (the caller's own cancellation applies)
    pub operation_timeout: Option<Duration>,
}

impl StoreConfig {
    /// Create a configuration with an empty namespace and no deadline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            namespace: String::new(),
            operation_timeout: None,
        }
    }

    /// Set the key namespace prefix.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the per-operation deadline.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Load configuration from `TOKEN_STORE_NAMESPACE` and
    /// `TOKEN_STORE_OPERATION_TIMEOUT_MS`. Both are optional.
    ///
    /// # Errors
    ///
    /// Returns error if the timeout is not a number or fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(namespace) = std::env::var(NAMESPACE_ENV) {
            config.namespace = namespace;
        }

        if let Ok(raw) = std::env::var(OPERATION_TIMEOUT_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::ParseError {
                    name: OPERATION_TIMEOUT_ENV.to_string(),
                    reason: e.to_string(),
                }
            })?;
            config.operation_timeout = Some(Duration::from_millis(millis));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the operation timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operation_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationError(
                "operation_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
