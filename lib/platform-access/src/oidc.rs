//! OIDC (OpenID Connect) client configuration.
//!
//! The gateway is a confidential client of an external identity provider.
//! The same client credentials are embedded into every materialized
//! kubeconfig so that kubectl can refresh tokens on its own.

use serde::{Deserialize, Serialize};

/// Configuration for the OIDC identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// The OIDC issuer URL (e.g., "https://login.example.com/realms/main").
    /// Used for discovery and copied into materialized kubeconfigs.
    issuer_url: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "openid,profile,email,offline_access"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// The claim name in the ID token that contains user groups.
    /// Default: "groups"
    #[serde(default = "default_groups_claim")]
    groups_claim: String,
    /// Timeout for each call to the provider, in seconds.
    /// Default: 10
    #[serde(default = "default_request_timeout_seconds")]
    request_timeout_seconds: u64,
}

fn default_scopes() -> String {
    "openid,profile,email,offline_access".to_string()
}

fn default_groups_claim() -> String {
    "groups".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer_url", &self.issuer_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("groups_claim", &self.groups_claim)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl OidcConfig {
    /// Creates a new OIDC configuration with defaults for optional fields.
    #[must_use]
    pub fn new(issuer_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            issuer_url,
            client_id,
            client_secret,
            scopes: default_scopes(),
            groups_claim: default_groups_claim(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(issuer_url: String, client_id: String, client_secret: String) -> OidcConfigBuilder {
        OidcConfigBuilder::new(issuer_url, client_id, client_secret)
    }

    /// Returns the OIDC issuer URL.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 scopes to request, parsed from comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns the name of the claim containing user groups.
    #[must_use]
    pub fn groups_claim(&self) -> &str {
        &self.groups_claim
    }

    /// Returns the per-call timeout for provider requests.
    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Builder for `OidcConfig`.
#[derive(Debug)]
pub struct OidcConfigBuilder {
    issuer_url: String,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    groups_claim: String,
    request_timeout_seconds: u64,
}

impl OidcConfigBuilder {
    /// Creates a new builder with required fields.
    #[must_use]
    pub fn new(issuer_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            issuer_url,
            client_id,
            client_secret,
            scopes: default_scopes().split(',').map(str::to_string).collect(),
            groups_claim: default_groups_claim(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Adds a scope to the list of scopes to request.
    #[must_use]
    pub fn add_scope(mut self, scope: String) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Sets the claim name for user groups.
    #[must_use]
    pub fn groups_claim(mut self, claim: String) -> Self {
        self.groups_claim = claim;
        self
    }

    /// Sets the provider request timeout.
    #[must_use]
    pub fn request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = seconds;
        self
    }

    /// Builds the `OidcConfig`.
    #[must_use]
    pub fn build(self) -> OidcConfig {
        OidcConfig {
            issuer_url: self.issuer_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scopes: self.scopes.join(","),
            groups_claim: self.groups_claim,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_has_defaults() {
        let config = OidcConfig::new(
            "https://auth.example.com".to_string(),
            "kubebrowser".to_string(),
            "s3cret".to_string(),
        );

        assert_eq!(config.issuer_url(), "https://auth.example.com");
        assert_eq!(config.client_id(), "kubebrowser");
        assert_eq!(config.client_secret(), "s3cret");
        assert_eq!(
            config.scopes(),
            vec!["openid", "profile", "email", "offline_access"]
        );
        assert_eq!(config.groups_claim(), "groups");
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(10));
    }

    #[test]
    fn builder_allows_customization() {
        let config = OidcConfig::builder(
            "https://auth.example.com".to_string(),
            "kubebrowser".to_string(),
            "s3cret".to_string(),
        )
        .groups_claim("cognito:groups".to_string())
        .add_scope("groups".to_string())
        .add_scope("openid".to_string())
        .request_timeout_seconds(3)
        .build();

        assert_eq!(config.groups_claim(), "cognito:groups");
        assert!(config.scopes().contains(&"groups"));
        assert_eq!(config.scopes().iter().filter(|s| **s == "openid").count(), 1);
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(3));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{
            "issuer_url": "https://auth.example.com",
            "client_id": "my-client",
            "client_secret": "secret"
        }"#;

        let config: OidcConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.client_id(), "my-client");
        assert_eq!(config.groups_claim(), "groups");
        assert!(config.scopes().contains(&"offline_access"));
    }

    #[test]
    fn scopes_ignore_blank_entries() {
        let json = r#"{
            "issuer_url": "https://auth.example.com",
            "client_id": "my-client",
            "client_secret": "secret",
            "scopes": "openid, email,, groups "
        }"#;

        let config: OidcConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.scopes(), vec!["openid", "email", "groups"]);
    }

    #[test]
    fn debug_redacts_client_secret() {
        let config = OidcConfig::new(
            "https://auth.example.com".to_string(),
            "kubebrowser".to_string(),
            "s3cret".to_string(),
        );

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("redacted"));
    }
}
