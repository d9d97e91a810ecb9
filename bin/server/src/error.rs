//! Domain error types for server operations.
//!
//! Internal details are logged where the error is turned into a response;
//! clients only ever see a short, fixed message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration could not be read or deserialized.
    Load { details: String },
    /// A field holds an unacceptable value.
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { details } => write!(f, "failed to load configuration: {details}"),
            Self::Invalid { field, reason } => {
                write!(f, "invalid configuration '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from the JSON API.
#[derive(Debug)]
pub enum ApiError {
    /// The request reached a handler without verified credentials.
    Unauthenticated,
    /// The ID token's claims could not be decoded.
    InvalidClaims { details: String },
    /// The record source failed.
    Records { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "not authenticated"),
            Self::InvalidClaims { details } => write!(f, "invalid identity claims: {details}"),
            Self::Records { details } => write!(f, "record listing failed: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated"),
            Self::InvalidClaims { .. } => {
                tracing::warn!(error = %self, "rejecting request with undecodable claims");
                (StatusCode::UNAUTHORIZED, "Invalid identity")
            }
            Self::Records { .. } => {
                tracing::error!(error = %self, "record listing failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}
