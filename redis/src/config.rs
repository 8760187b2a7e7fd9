//! Redis backend configuration.

use oauth_lease_store_core::ConfigError;

/// Environment variable holding the Redis connection URL.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Environment variable overriding the lease key prefix.
pub const LEASE_PREFIX_ENV: &str = "TOKEN_STORE_LEASE_PREFIX";

/// Default lease key prefix.
pub const DEFAULT_LEASE_PREFIX: &str = "token_store:lease:";

const URL_SCHEMES: [&str; 3] = ["redis://", "rediss://", "redis+unix://"];

/// Configuration for a [`RedisLeaseStore`](crate::RedisLeaseStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Redis connection URL.
    ///
    /// - TCP: `redis://[:password@]host[:port][/database]`
    /// - TLS: `rediss://[:password@]host[:port][/database]`
    /// - Unix socket: `redis+unix:///path/to/redis.sock`
    ///
    /// Default: `redis://127.0.0.1:6379`
    pub url: String,

    /// Prefix of the lease marker keys and of the lease id sequence.
    ///
    /// Lease markers live outside any token namespace, so stores sharing a
    /// Redis instance share one lease space unless this differs.
    ///
    /// Default: `token_store:lease:`
    pub lease_key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            lease_key_prefix: DEFAULT_LEASE_PREFIX.to_string(),
        }
    }
}

impl RedisConfig {
    /// Create a configuration for `url` with the default lease prefix.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the lease key prefix.
    #[must_use]
    pub fn with_lease_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lease_key_prefix = prefix.into();
        self
    }

    /// Load configuration from the environment.
    ///
    /// `REDIS_URL` is required, `TOKEN_STORE_LEASE_PREFIX` is optional.
    ///
    /// # Errors
    ///
    /// Returns error if `REDIS_URL` is unset or the result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var(REDIS_URL_ENV)
            .map_err(|_| ConfigError::EnvVarNotSet(REDIS_URL_ENV.to_string()))?;

        let mut config = Self::new(url);
        if let Ok(prefix) = std::env::var(LEASE_PREFIX_ENV) {
            config.lease_key_prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the URL has an unknown scheme or the lease prefix is
    /// empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !URL_SCHEMES.iter().any(|scheme| self.url.starts_with(scheme)) {
            return Err(ConfigError::ValidationError(format!(
                "url must start with one of {URL_SCHEMES:?}"
            )));
        }

        if self.lease_key_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "lease_key_prefix cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Key of the lease marker for `id`.
    pub(crate) fn lease_key(&self, id: i64) -> String {
        format!("{}{id}", self.lease_key_prefix)
    }

    /// Key of the counter lease ids are drawn from.
    pub(crate) fn lease_sequence_key(&self) -> String {
        format!("{}seq", self.lease_key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RedisConfig::default();

        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.lease_key_prefix, DEFAULT_LEASE_PREFIX);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn accepts_tls_and_unix_urls() {
        assert!(RedisConfig::new("rediss://cache.internal:6380").validate().is_ok());
        assert!(RedisConfig::new("redis+unix:///run/redis.sock").validate().is_ok());
    }

    #[test]
    fn rejects_unknown_scheme() {
        let config = RedisConfig::new("http://127.0.0.1:6379");

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_empty_lease_prefix() {
        let config = RedisConfig::default().with_lease_key_prefix("");

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn lease_keys_share_prefix() {
        let config = RedisConfig::default().with_lease_key_prefix("tenant:lease:");

        assert_eq!(config.lease_key(42), "tenant:lease:42");
        assert_eq!(config.lease_sequence_key(), "tenant:lease:seq");
    }
}
