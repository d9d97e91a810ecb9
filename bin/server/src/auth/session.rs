//! Session cookie handling.
//!
//! The session layer resolves the signed `session` cookie into a
//! [`Session`] handle for the rest of the request and re-issues the cookie
//! on the way out, so the browser-side lifetime tracks the store's.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use kubebrowser_platform_access::{Session, SessionId};

use crate::app::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session";

/// Loads the session and stores it in the request extensions.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let jar = SignedCookieJar::from_headers(request.headers(), state.settings.session_key.clone());
    let requested = jar
        .get(SESSION_COOKIE)
        .map(|cookie| SessionId::new(cookie.value().to_string()));

    let session = match Session::load(state.sessions.clone(), requested).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "failed to load session");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    let cookie = Cookie::build((SESSION_COOKIE, session.id().to_string()))
        .path("/")
        .http_only(true)
        .secure(state.settings.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(state.settings.session_cookie_max_age());

    (jar.add(cookie), response).into_response()
}
