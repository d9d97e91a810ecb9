//! Shared application state and router assembly.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use axum_extra::extract::cookie::Key;
use kubebrowser_platform_access::{ClaimsExtractor, IdentityProvider, Materializer, SessionStore};
use kubebrowser_records::{RecordSource, Selector};
use rootcause::Report;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::routes::found;
use crate::auth::{HEALTH_PATH, auth_guard, callback, session_layer};
use crate::config::{CALLBACK_PATH, ServerConfig};
use crate::error::ConfigError;

/// Landing page of the UI.
pub const HOME_PATH: &str = "/home";

/// Request-independent settings derived from the configuration.
#[derive(Clone)]
pub struct AppSettings {
    /// Namespace records are listed from.
    pub namespace: String,
    /// Label selector applied to records.
    pub selector: Selector,
    /// Signing key for the session cookie.
    pub session_key: Key,
    /// Session lifetime.
    pub session_ttl: chrono::Duration,
    /// Whether cookies carry the Secure flag.
    pub secure_cookies: bool,
    /// Directory the UI is served from. No UI is served when unset.
    pub static_dir: Option<PathBuf>,
}

impl AppSettings {
    /// Derives settings from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the session secret or the selector is unusable.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Report<ConfigError>> {
        let session_key =
            Key::try_from(config.session.secret.as_bytes()).map_err(|e| ConfigError::Invalid {
                field: "session.secret",
                reason: e.to_string(),
            })?;

        Ok(Self {
            namespace: config.namespace.clone(),
            selector: config.selector()?,
            session_key,
            session_ttl: config.session_ttl(),
            secure_cookies: config.session.secure_cookies,
            static_dir: Some(config.static_dir.clone()),
        })
    }

    /// Returns the `Max-Age` of the session cookie.
    #[must_use]
    pub fn session_cookie_max_age(&self) -> time::Duration {
        time::Duration::seconds(self.session_ttl.num_seconds())
    }
}

impl std::fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSettings")
            .field("namespace", &self.namespace)
            .field("selector", &self.selector)
            .field("session_key", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("secure_cookies", &self.secure_cookies)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

/// Shared application state.
///
/// Built once at start-up and handed to every handler and middleware
/// through axum's `State`.
pub struct AppState {
    /// Identity provider used for login, refresh and verification.
    pub idp: Arc<dyn IdentityProvider>,
    /// Session storage backend.
    pub sessions: Arc<dyn SessionStore>,
    /// Source of configuration records.
    pub records: Arc<dyn RecordSource>,
    /// Decodes identities from verified tokens.
    pub claims: ClaimsExtractor,
    /// Builds per-user kubeconfigs.
    pub materializer: Materializer,
    /// Settings derived from configuration.
    pub settings: AppSettings,
}

/// Builds the application router.
///
/// Every route, the UI fallback included, sits behind the auth guard. The
/// session layer wraps the guard so the guard always finds a session.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(|| async { found(HOME_PATH) }))
        .route(CALLBACK_PATH, get(callback))
        .route(HEALTH_PATH, get(api::healthz))
        .route("/api/kubeconfigs", get(api::list_kubeconfigs))
        .route("/api/me", get(api::me));

    if let Some(dir) = &state.settings.static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(dir).fallback(index));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
