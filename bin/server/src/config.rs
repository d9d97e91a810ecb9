//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested fields
//! use a double underscore, e.g. `OIDC__CLIENT_ID` or `SESSION__SECRET`.
//!
//! See [`OidcConfig`](kubebrowser_platform_access::OidcConfig) for
//! OIDC authentication configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use kubebrowser_platform_access::OidcConfig;
use kubebrowser_records::Selector;
use rootcause::Report;
use serde::Deserialize;

use crate::error::ConfigError;

/// Path the identity provider redirects back to.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Minimum session secret length accepted by the cookie signing key.
const MIN_SECRET_LEN: usize = 64;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Public base URL of this server, e.g. `https://kubebrowser.example.com`.
    pub external_url: String,

    /// Namespace records are read from.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Optional `k=v,k2=v2` label selector applied to records.
    #[serde(default)]
    pub record_selector: Option<String>,

    /// Optional JSON record snapshot. When set, Kubernetes is not contacted.
    #[serde(default)]
    pub records_file: Option<PathBuf>,

    /// Directory holding the built UI.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Session configuration.
    pub session: SessionConfig,

    /// OIDC authentication configuration.
    pub oidc: OidcConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Session-related configuration.
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// Key material for signing the session cookie.
    pub secret: String,

    /// Session lifetime in minutes, extended on every save.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// PostgreSQL URL. Sessions are kept in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl_minutes", &self.ttl_minutes)
            .field("cleanup_interval_seconds", &self.cleanup_interval_seconds)
            .field("secure_cookies", &self.secure_cookies)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("ui/dist")
}

fn default_ttl_minutes() -> i64 {
    24 * 60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl ServerConfig {
    /// Loads and validates configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ConfigError>> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ConfigError::Load {
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), Report<ConfigError>> {
        if self.session.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                field: "session.secret",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            }
            .into());
        }
        if self.session.ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                field: "session.ttl_minutes",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        if self.session.cleanup_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "session.cleanup_interval_seconds",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        if !self.external_url.starts_with("http://") && !self.external_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "external_url",
                reason: "must be an http(s) URL".to_string(),
            }
            .into());
        }
        self.selector()?;
        Ok(())
    }

    /// Returns the OIDC redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.external_url.trim_end_matches('/'))
    }

    /// Parses the record selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector is malformed.
    pub fn selector(&self) -> Result<Selector, Report<ConfigError>> {
        match &self.record_selector {
            None => Ok(Selector::everything()),
            Some(raw) => raw.parse().map_err(|e: kubebrowser_records::RecordSourceError| {
                ConfigError::Invalid {
                    field: "record_selector",
                    reason: e.to_string(),
                }
                .into()
            }),
        }
    }

    /// Returns the session lifetime.
    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session.ttl_minutes)
    }
}
