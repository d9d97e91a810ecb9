//! Authentication for the kubebrowser server.
//!
//! This module provides:
//! - The OIDC client talking to the identity provider
//! - Signed-cookie sessions and a PostgreSQL session store
//! - The auth guard middleware and the `Authenticated` extractor
//! - The login redirect and the OIDC callback handler
//!
//! # Request flow
//!
//! The session layer runs first and attaches a [`Session`] to every
//! request. The auth guard then records the requested route, verifies the
//! session's ID token and silently refreshes it when it has expired. A
//! request with no usable token is redirected to the identity provider;
//! the callback stores the new tokens and sends the browser back to the
//! route it first asked for.
//!
//! Group membership is read from the ID token on every request, so changes
//! at the identity provider take effect on the next token refresh.
//!
//! [`Session`]: kubebrowser_platform_access::Session

pub mod db;
pub mod middleware;
pub mod oidc;
pub mod routes;
pub mod session;

pub use db::PgSessionStore;
pub use middleware::{Authenticated, GuardRejection, HEALTH_PATH, auth_guard};
pub use oidc::OidcClient;
pub use routes::{LoginRedirect, NONCE_COOKIE, STATE_COOKIE, callback};
pub use session::{SESSION_COOKIE, session_layer};
