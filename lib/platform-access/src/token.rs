//! Token types and the identity provider seam.
//!
//! The auth guard and callback handler only see the provider through
//! [`IdentityProvider`], so the state machine can be driven by a scripted
//! provider in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::Report;

use crate::error::IdpError;

/// Token set returned by the provider's token endpoint.
///
/// The access token is deliberately not kept: only the ID token and the
/// refresh token are ever stored or handed to users.
#[derive(Clone, Default)]
pub struct TokenSet {
    /// Raw signed ID token, taken from the response's extra fields.
    pub id_token: Option<String>,
    /// Refresh token, if the provider issued one.
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// An ID token whose signature, issuer and audience have been checked.
///
/// Only an [`IdentityProvider`] implementation should build one of these;
/// everything downstream (claims extraction, materialization) relies on
/// that check having happened.
#[derive(Clone)]
pub struct VerifiedIdToken {
    raw: String,
    expires_at: DateTime<Utc>,
    nonce: Option<String>,
}

impl VerifiedIdToken {
    /// Wraps a raw token that has passed verification.
    #[must_use]
    pub fn new(raw: String, expires_at: DateTime<Utc>, nonce: Option<String>) -> Self {
        Self {
            raw,
            expires_at,
            nonce,
        }
    }

    /// Returns the raw compact JWT.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the `exp` claim.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the `nonce` claim, if present.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Returns true unless the expiry lies strictly after `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns true if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl std::fmt::Debug for VerifiedIdToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiedIdToken")
            .field("raw", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("nonce", &self.nonce.is_some())
            .finish()
    }
}

/// Operations the gateway needs from an OpenID Connect provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the authorization endpoint URL carrying `state` and `nonce`.
    fn authorization_url(&self, state: &str, nonce: &str) -> String;

    /// Exchanges an authorization code for a token set.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, Report<IdpError>>;

    /// Exchanges a refresh token for a new token set.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, Report<IdpError>>;

    /// Verifies an ID token's signature and standard claims.
    ///
    /// The nonce is not checked here; the callback compares it against the
    /// login round-trip cookie itself.
    async fn verify(&self, raw_id_token: &str) -> Result<VerifiedIdToken, Report<IdpError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_expiry_is_strict() {
        let now = Utc::now();
        let token = VerifiedIdToken::new("a.b.c".to_string(), now, None);

        assert!(token.is_expired_at(now));
        assert!(!token.is_expired_at(now - Duration::seconds(1)));
        assert!(token.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn fresh_token_is_not_expired() {
        let token = VerifiedIdToken::new(
            "a.b.c".to_string(),
            Utc::now() + Duration::minutes(5),
            Some("n-1".to_string()),
        );

        assert!(!token.is_expired());
        assert_eq!(token.nonce(), Some("n-1"));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let token = VerifiedIdToken::new("header.payload.sig".to_string(), Utc::now(), None);
        let set = TokenSet {
            id_token: Some("header.payload.sig".to_string()),
            refresh_token: Some("refresh-secret".to_string()),
        };

        assert!(!format!("{token:?}").contains("payload"));
        let rendered = format!("{set:?}");
        assert!(!rendered.contains("payload"));
        assert!(!rendered.contains("refresh-secret"));
    }
}
