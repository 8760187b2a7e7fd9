//! The token record: one authorization grant and the credentials issued for it.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A credential string together with its issue time and validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    /// The credential itself. Used verbatim as a lookup key.
    pub value: String,

    /// When the credential was issued.
    pub created_at: DateTime<Utc>,

    /// How long the credential is valid after `created_at`.
    pub expires_in: Duration,
}

impl IssuedCredential {
    /// Create a new issued credential.
    #[must_use]
    pub fn new(value: impl Into<String>, created_at: DateTime<Utc>, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            created_at,
            expires_in,
        }
    }

    /// Validity as a signed delta, saturating for durations chrono cannot hold.
    #[must_use]
    pub fn validity(&self) -> TimeDelta {
        TimeDelta::from_std(self.expires_in).unwrap_or(TimeDelta::MAX)
    }

    /// Instant after which the credential is no longer valid.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(self.validity())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Validity left at `now`. Negative once the credential has expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        self.expires_at().signed_duration_since(now)
    }

    /// Whether the credential has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Full description of one authorization grant.
///
/// A record carries either an authorization code (code flow, before exchange)
/// or an access token with an optional refresh token. Credentials whose value
/// is empty are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// OAuth client the grant belongs to.
    pub client_id: String,

    /// Resource owner the grant was issued for.
    pub user_id: String,

    /// Redirect URI used in the authorization request.
    #[serde(default)]
    pub redirect_uri: String,

    /// Granted scope.
    #[serde(default)]
    pub scope: String,

    /// Authorization code.
    #[serde(default)]
    pub code: Option<IssuedCredential>,

    /// PKCE code challenge bound to the authorization code.
    #[serde(default)]
    pub code_challenge: Option<String>,

    /// PKCE challenge method (`plain` or `S256`).
    #[serde(default)]
    pub code_challenge_method: Option<String>,

    /// Access token.
    #[serde(default)]
    pub access: Option<IssuedCredential>,

    /// Refresh token.
    #[serde(default)]
    pub refresh: Option<IssuedCredential>,
}

impl TokenRecord {
    /// Create a record for a client and user with no credentials yet.
    #[must_use]
    pub fn new(client_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
            redirect_uri: String::new(),
            scope: String::new(),
            code: None,
            code_challenge: None,
            code_challenge_method: None,
            access: None,
            refresh: None,
        }
    }

    /// Set the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// Set the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Attach an authorization code.
    #[must_use]
    pub fn with_code(
        mut self,
        code: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.code = Some(IssuedCredential::new(code, created_at, expires_in));
        self
    }

    /// Bind a PKCE challenge to the authorization code.
    #[must_use]
    pub fn with_code_challenge(
        mut self,
        challenge: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = Some(method.into());
        self
    }

    /// Attach an access token.
    #[must_use]
    pub fn with_access(
        mut self,
        access: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.access = Some(IssuedCredential::new(access, created_at, expires_in));
        self
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh(
        mut self,
        refresh: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_in: Duration,
    ) -> Self {
        self.refresh = Some(IssuedCredential::new(refresh, created_at, expires_in));
        self
    }

    /// The authorization code, if one was issued.
    #[must_use]
    pub fn code(&self) -> Option<&IssuedCredential> {
        non_empty(self.code.as_ref())
    }

    /// The access token, if one was issued.
    #[must_use]
    pub fn access(&self) -> Option<&IssuedCredential> {
        non_empty(self.access.as_ref())
    }

    /// The refresh token, if one was issued.
    #[must_use]
    pub fn refresh(&self) -> Option<&IssuedCredential> {
        non_empty(self.refresh.as_ref())
    }
}

fn non_empty(credential: Option<&IssuedCredential>) -> Option<&IssuedCredential> {
    credential.filter(|c| !c.value.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn empty_credentials_are_absent() {
        let record = TokenRecord::new("client", "user").with_code("", epoch(), Duration::from_secs(5));

        assert!(record.code.is_some());
        assert!(record.code().is_none());
        assert!(record.access().is_none());
        assert!(record.refresh().is_none());
    }

    #[test]
    fn remaining_goes_negative_after_expiry() {
        let refresh = IssuedCredential::new("r", epoch(), Duration::from_secs(10));

        assert_eq!(refresh.remaining(epoch()), TimeDelta::seconds(10));
        assert_eq!(
            refresh.remaining(epoch() + TimeDelta::seconds(15)),
            TimeDelta::seconds(-5)
        );
        assert!(refresh.is_expired(epoch() + TimeDelta::seconds(10)));
        assert!(!refresh.is_expired(epoch() + TimeDelta::seconds(9)));
    }

    #[test]
    fn huge_validity_saturates() {
        let code = IssuedCredential::new("c", epoch(), Duration::from_secs(u64::MAX));

        assert_eq!(code.validity(), TimeDelta::MAX);
        assert_eq!(code.expires_at(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn missing_optional_fields_deserialize() {
        let json = r#"{"client_id":"1","user_id":"1_1"}"#;
        let record: TokenRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record, TokenRecord::new("1", "1_1"));
    }
}
