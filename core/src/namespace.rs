//! Key namespacing.
//!
//! Every physical key the token store reads or writes goes through
//! [`KeyNamespace::wrap`]. Skipping it for a single call would silently split
//! the keyspace, so the store never builds keys any other way.

use std::fmt;

/// Prefix prepended to every physical key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    /// Create a namespace with the given prefix. An empty prefix is allowed.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Map a logical key (credential or basic ID) to its physical key.
    #[must_use]
    pub fn wrap(&self, key: &str) -> String {
        let mut physical = String::with_capacity(self.prefix.len() + key.len());
        physical.push_str(&self.prefix);
        physical.push_str(key);
        physical
    }
}

impl fmt::Display for KeyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_prefix_is_identity() {
        assert_eq!(KeyNamespace::default().wrap("11_11_11"), "11_11_11");
    }

    #[test]
    fn prefix_is_prepended() {
        assert_eq!(KeyNamespace::new("test:").wrap("1_1_1"), "test:1_1_1");
    }

    proptest! {
        #[test]
        fn wrap_is_plain_concatenation(prefix in ".{0,16}", key in ".{0,32}") {
            let ns = KeyNamespace::new(prefix.clone());
            prop_assert_eq!(ns.wrap(&key), format!("{prefix}{key}"));
        }

        #[test]
        fn distinct_keys_stay_distinct(prefix in "[a-z:]{0,8}", a in "[a-z0-9_]{1,16}", b in "[a-z0-9_]{1,16}") {
            prop_assume!(a != b);
            let ns = KeyNamespace::new(prefix);
            prop_assert_ne!(ns.wrap(&a), ns.wrap(&b));
        }
    }
}
