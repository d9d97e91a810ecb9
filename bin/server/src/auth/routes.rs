//! Login redirect and OIDC callback.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use kubebrowser_platform_access::{IdentityProvider, Session, SessionKey};
use openidconnect::{CsrfToken, Nonce};
use serde::Deserialize;
use time::Duration as TimeDuration;
use tracing::{debug, error, info, warn};

use crate::app::AppState;

/// Login round-trip state cookie name.
pub const STATE_COOKIE: &str = "state";

/// Login round-trip nonce cookie name.
pub const NONCE_COOKIE: &str = "nonce";

/// Builds a `302 Found` redirect.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn login_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::hours(1))
        .build()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Redirect to the identity provider's authorization endpoint.
///
/// Carries a fresh random `state` and `nonce`, which are also set as
/// cookies so the callback can check what comes back.
pub struct LoginRedirect {
    auth_url: String,
    state: String,
    nonce: String,
    secure: bool,
}

impl LoginRedirect {
    pub fn new(idp: &dyn IdentityProvider, secure: bool) -> Self {
        let state = CsrfToken::new_random().secret().clone();
        let nonce = Nonce::new_random().secret().clone();
        let auth_url = idp.authorization_url(&state, &nonce);
        Self {
            auth_url,
            state,
            nonce,
            secure,
        }
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        let jar = CookieJar::new()
            .add(login_cookie(STATE_COOKIE, self.state, self.secure))
            .add(login_cookie(NONCE_COOKIE, self.nonce, self.secure));
        (jar, found(&self.auth_url)).into_response()
    }
}

/// Query parameters for the OIDC callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Handles the OIDC callback after the user authenticates with the identity provider.
///
/// The `state` and `nonce` cookies are cleared whatever the outcome.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let outcome = complete_login(&state, &session, &query, &jar).await;

    let jar = jar
        .remove(expired_cookie(STATE_COOKIE))
        .remove(expired_cookie(NONCE_COOKIE));

    match outcome {
        Ok(location) => {
            info!(session_id = %session.id(), "login completed");
            (jar, found(&location)).into_response()
        }
        Err(e) => (jar, e).into_response(),
    }
}

async fn complete_login(
    state: &AppState,
    session: &Session,
    query: &CallbackQuery,
    jar: &CookieJar,
) -> Result<String, CallbackError> {
    let expected_state = jar
        .get(STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(CallbackError::MissingState)?;
    if query.state.as_deref() != Some(expected_state.as_str()) {
        return Err(CallbackError::StateMismatch);
    }

    if let Some(error) = &query.error {
        return Err(CallbackError::Provider {
            error: error.clone(),
            description: query.error_description.clone().unwrap_or_default(),
        });
    }
    let code = query.code.as_deref().ok_or(CallbackError::MissingCode)?;

    let tokens = state
        .idp
        .exchange_code(code)
        .await
        .map_err(|e| CallbackError::TokenExchange {
            details: e.to_string(),
        })?;

    let raw_id_token = tokens.id_token.ok_or(CallbackError::MissingIdToken)?;

    let id_token = state
        .idp
        .verify(&raw_id_token)
        .await
        .map_err(|e| CallbackError::TokenValidation {
            details: e.to_string(),
        })?;

    let expected_nonce = jar
        .get(NONCE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(CallbackError::MissingNonce)?;
    if id_token.nonce() != Some(expected_nonce.as_str()) {
        return Err(CallbackError::NonceMismatch);
    }

    session.set(SessionKey::IdToken, raw_id_token).await;
    match tokens.refresh_token {
        Some(refresh_token) => session.set(SessionKey::RefreshToken, refresh_token).await,
        None => {
            debug!("provider issued no refresh token");
            session.remove(SessionKey::RefreshToken).await;
        }
    }
    session
        .save()
        .await
        .map_err(|e| CallbackError::SessionStore {
            details: e.to_string(),
        })?;

    let route = session.get(SessionKey::InitialRoute).await;
    Ok(local_route(route.as_deref()).to_string())
}

/// Returns `route` if it stays on this host, `/` otherwise.
///
/// Browsers read `//host` and `/\host` as references to another host.
fn local_route(route: Option<&str>) -> &str {
    match route {
        Some(route)
            if route.starts_with('/')
                && !route.starts_with("//")
                && !route.starts_with("/\\") =>
        {
            route
        }
        Some(route) => {
            warn!(route, "initial route leaves this host, redirecting to /");
            "/"
        }
        None => "/",
    }
}

/// Callback errors.
#[derive(Debug)]
pub enum CallbackError {
    MissingState,
    StateMismatch,
    Provider { error: String, description: String },
    MissingCode,
    TokenExchange { details: String },
    MissingIdToken,
    TokenValidation { details: String },
    MissingNonce,
    NonceMismatch,
    SessionStore { details: String },
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingState => {
                warn!("state cookie not found");
                (StatusCode::BAD_REQUEST, "State not found")
            }
            Self::StateMismatch => {
                warn!("state did not match");
                (StatusCode::BAD_REQUEST, "State did not match")
            }
            Self::Provider { error, description } => {
                warn!(%error, %description, "identity provider returned an error");
                (StatusCode::BAD_REQUEST, "Login was not completed")
            }
            Self::MissingCode => {
                warn!("callback carried no authorization code");
                (StatusCode::BAD_REQUEST, "Missing authorization code")
            }
            Self::TokenExchange { details } => {
                error!(%details, "failed to exchange authorization code");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to exchange token")
            }
            Self::MissingIdToken => {
                error!("no id_token field in token response");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "No id_token field in token response",
                )
            }
            Self::TokenValidation { details } => {
                error!(%details, "failed to verify ID token");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to verify ID token")
            }
            Self::MissingNonce => {
                warn!("nonce cookie not found");
                (StatusCode::BAD_REQUEST, "Nonce not found")
            }
            Self::NonceMismatch => {
                warn!("nonce did not match");
                (StatusCode::BAD_REQUEST, "Nonce did not match")
            }
            Self::SessionStore { details } => {
                error!(%details, "cannot save session");
                (StatusCode::INTERNAL_SERVER_ERROR, "Cannot save session")
            }
        };

        (status, message).into_response()
    }
}
