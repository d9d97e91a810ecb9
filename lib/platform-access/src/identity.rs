//! Principal identity decoded from a verified ID token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rootcause::Report;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ClaimsError;
use crate::token::VerifiedIdToken;

/// The principal a request is made on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// The `email` claim. Empty when the token carries none.
    pub email: String,
    /// Group memberships from the configured groups claim.
    pub groups: Vec<String>,
    name: Option<String>,
    preferred_username: Option<String>,
}

impl Identity {
    /// Creates an identity with no display claims.
    #[must_use]
    pub fn new(email: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            email: email.into(),
            groups,
            name: None,
            preferred_username: None,
        }
    }

    /// Sets the `name` claim.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name to show in the UI: `name`, then `preferred_username`, then `email`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.preferred_username.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or(&self.email)
    }
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    email: String,
    #[serde(default)]
    groups: Option<Vec<String>>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

/// Decodes identity claims out of verified ID tokens.
///
/// The token signature has already been checked by the identity provider,
/// so extraction only base64-decodes the payload segment.
#[derive(Debug, Clone)]
pub struct ClaimsExtractor {
    groups_claim: String,
}

impl Default for ClaimsExtractor {
    fn default() -> Self {
        Self::new("groups")
    }
}

impl ClaimsExtractor {
    /// Creates an extractor reading groups from `groups_claim`.
    #[must_use]
    pub fn new(groups_claim: impl Into<String>) -> Self {
        Self {
            groups_claim: groups_claim.into(),
        }
    }

    /// Extracts the identity from a verified token.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded or a claim has an
    /// unexpected type. A missing `email` or groups claim is not an error.
    pub fn extract(&self, token: &VerifiedIdToken) -> Result<Identity, Report<ClaimsError>> {
        self.extract_raw(token.raw())
    }

    fn extract_raw(&self, raw: &str) -> Result<Identity, Report<ClaimsError>> {
        let mut segments = raw.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(ClaimsError::MalformedToken.into()),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ClaimsError::InvalidPayload {
                reason: e.to_string(),
            })?;

        let mut claims: Map<String, Value> =
            serde_json::from_slice(&bytes).map_err(|e| ClaimsError::InvalidPayload {
                reason: e.to_string(),
            })?;

        // Normalize the configured claim name onto "groups".
        let groups = claims.remove(&self.groups_claim);
        claims.remove("groups");
        if let Some(groups) = groups {
            claims.insert("groups".to_string(), groups);
        }

        let claims: RawClaims =
            serde_json::from_value(Value::Object(claims)).map_err(|e| {
                ClaimsError::InvalidClaims {
                    reason: e.to_string(),
                }
            })?;

        Ok(Identity {
            email: claims.email,
            groups: claims.groups.unwrap_or_default(),
            name: claims.name,
            preferred_username: claims.preferred_username,
        })
    }
}
