//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `IdpError`: failures talking to or trusting the identity provider
//! - `ClaimsError`: a verified ID token whose claims cannot be decoded
//! - `SessionStoreError`: the session store could not load or persist

use std::fmt;

/// Errors from identity provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdpError {
    /// Invalid client configuration (URLs, HTTP client setup).
    Configuration { reason: String },
    /// Provider metadata or signing keys could not be fetched.
    Discovery { reason: String },
    /// The authorization code exchange failed.
    TokenExchange { reason: String },
    /// The refresh token exchange failed.
    Refresh { reason: String },
    /// The token endpoint response carried no ID token.
    MissingIdToken,
    /// ID token signature or claims validation failed.
    TokenValidation { reason: String },
}

impl fmt::Display for IdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { reason } => write!(f, "OIDC configuration error: {reason}"),
            Self::Discovery { reason } => write!(f, "OIDC discovery error: {reason}"),
            Self::TokenExchange { reason } => write!(f, "OIDC token exchange error: {reason}"),
            Self::Refresh { reason } => write!(f, "OIDC token refresh error: {reason}"),
            Self::MissingIdToken => write!(f, "no id_token field in token response"),
            Self::TokenValidation { reason } => {
                write!(f, "OIDC token validation error: {reason}")
            }
        }
    }
}

impl std::error::Error for IdpError {}

/// Errors from decoding ID token claims.
///
/// Callers must treat any of these as an authorization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// The token is not a three-part compact JWT.
    MalformedToken,
    /// The payload segment is not base64url-encoded JSON.
    InvalidPayload { reason: String },
    /// The payload does not match the expected claim shapes.
    InvalidClaims { reason: String },
}

impl fmt::Display for ClaimsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedToken => write!(f, "ID token is not a compact JWT"),
            Self::InvalidPayload { reason } => write!(f, "invalid ID token payload: {reason}"),
            Self::InvalidClaims { reason } => write!(f, "invalid ID token claims: {reason}"),
        }
    }
}

impl std::error::Error for ClaimsError {}

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The backing store could not be reached or rejected the operation.
    Unavailable { details: String },
    /// A stored session could not be decoded.
    Corrupt { session_id: String, details: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "session store unavailable: {details}"),
            Self::Corrupt {
                session_id,
                details,
            } => write!(f, "session '{session_id}' is corrupt: {details}"),
        }
    }
}

impl std::error::Error for SessionStoreError {}
