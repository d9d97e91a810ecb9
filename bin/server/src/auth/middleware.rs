//! The auth guard and the extractor handlers use to read its result.
//!
//! Every request except the callback and health probe passes through
//! [`auth_guard`]. The guard re-derives the caller's state from the session
//! on each request: no token means a login redirect, a valid token lets the
//! request through, and an invalid or expired one gets exactly one silent
//! refresh attempt before falling back to a login redirect.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use kubebrowser_platform_access::{Session, SessionKey, SessionStoreError, VerifiedIdToken};
use rootcause::Report;
use tracing::{debug, error, info, warn};

use super::routes::LoginRedirect;
use crate::app::AppState;
use crate::config::CALLBACK_PATH;
use crate::error::ApiError;

/// Liveness probe path.
pub const HEALTH_PATH: &str = "/healthz";

const FAVICON_PATH: &str = "/favicon.ico";

/// Credentials the guard verified for the current request.
#[derive(Clone)]
pub struct Authenticated {
    /// The verified ID token, refreshed if the stored one had expired.
    pub token: VerifiedIdToken,
    /// The refresh token stored alongside it.
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for Authenticated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticated")
            .field("token", &self.token)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Rejections produced by the guard itself.
#[derive(Debug)]
pub enum GuardRejection {
    /// Path is never served.
    NotFound,
    /// The session could not be persisted.
    SessionStore { details: String },
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::SessionStore { details } => {
                error!(%details, "cannot save session");
                (StatusCode::INTERNAL_SERVER_ERROR, "Cannot save session").into_response()
            }
        }
    }
}

/// Authenticates the request or redirects to the identity provider.
pub async fn auth_guard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == FAVICON_PATH {
        return GuardRejection::NotFound.into_response();
    }
    if path == CALLBACK_PATH || path == HEALTH_PATH {
        debug!(path, "skipping authentication");
        return next.run(request).await;
    }

    let route = request
        .uri()
        .path_and_query()
        .map_or("/", |p| p.as_str())
        .to_string();
    session.set(SessionKey::InitialRoute, route).await;
    if let Err(e) = session.save().await {
        return GuardRejection::SessionStore {
            details: e.to_string(),
        }
        .into_response();
    }

    let Some(raw_id_token) = session.get(SessionKey::IdToken).await else {
        info!("ID token missing, redirecting to login");
        return LoginRedirect::new(state.idp.as_ref(), state.settings.secure_cookies)
            .into_response();
    };

    let (authenticated, save_error) = match state.idp.verify(&raw_id_token).await {
        Ok(token) if !token.is_expired() => {
            debug!("ID token is valid");
            let refresh_token = session.get(SessionKey::RefreshToken).await;
            (
                Authenticated {
                    token,
                    refresh_token,
                },
                None,
            )
        }
        outcome => {
            match outcome {
                Ok(_) => info!("ID token expired, attempting to refresh"),
                Err(e) => info!(error = %e, "ID token invalid, attempting to refresh"),
            }
            match silent_refresh(&state, &session).await {
                Some(refreshed) => refreshed,
                None => {
                    return LoginRedirect::new(state.idp.as_ref(), state.settings.secure_cookies)
                        .into_response();
                }
            }
        }
    };

    request.extensions_mut().insert(authenticated);
    let mut response = next.run(request).await;

    // The refreshed token already served this request; the next one would
    // start from stale session contents.
    if let Some(e) = save_error {
        error!(error = %e, "cannot save refreshed session");
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    }
    response
}

/// Exchanges the stored refresh token for a new ID token.
///
/// Returns `None` when the user has to log in again. The session is only
/// modified once the new ID token has been verified.
async fn silent_refresh(
    state: &AppState,
    session: &Session,
) -> Option<(Authenticated, Option<Report<SessionStoreError>>)> {
    let Some(refresh_token) = session.get(SessionKey::RefreshToken).await else {
        info!("refresh token missing, redirecting to login");
        return None;
    };

    let tokens = match state.idp.refresh(&refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(error = %e, "failed to refresh token, redirecting to login");
            return None;
        }
    };

    let Some(raw_id_token) = tokens.id_token else {
        warn!("refresh response carried no ID token, redirecting to login");
        return None;
    };

    let token = match state.idp.verify(&raw_id_token).await {
        Ok(token) if !token.is_expired() => token,
        Ok(_) => {
            warn!("refreshed ID token is already expired, redirecting to login");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "failed to verify refreshed ID token, redirecting to login");
            return None;
        }
    };

    // Providers may omit the refresh token when it was not rotated.
    let refresh_token = tokens.refresh_token.unwrap_or(refresh_token);

    session.set(SessionKey::IdToken, raw_id_token).await;
    session
        .set(SessionKey::RefreshToken, refresh_token.clone())
        .await;
    let save_error = session.save().await.err();

    info!(session_id = %session.id(), "ID token refreshed");

    Some((
        Authenticated {
            token,
            refresh_token: Some(refresh_token),
        },
        save_error,
    ))
}
