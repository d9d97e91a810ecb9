//! Configuration records served by kubebrowser.
//!
//! A record wraps a kubeconfig document together with an optional
//! whitelist controlling who may see it. Field names on the wire follow the
//! kubeconfig format (`apiVersion`, `current-context`, `auth-provider`, ...)
//! so that a record payload can be handed to `kubectl` as is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configuration record as held by the record source snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Namespace the record lives in.
    pub namespace: String,
    /// Object name, unique within the namespace.
    pub name: String,
    /// Labels used for selector matching.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// The record body.
    pub spec: KubeconfigSpec,
}

impl ConfigRecord {
    /// Creates a record with no labels.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: KubeconfigSpec) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: BTreeMap::new(),
            spec,
        }
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns the whitelist, if any.
    #[must_use]
    pub fn whitelist(&self) -> Option<&Whitelist> {
        self.spec.whitelist.as_ref()
    }
}

/// Body of a configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigSpec {
    /// Human readable name shown in the UI.
    pub name: String,
    /// The kubeconfig document.
    pub kubeconfig: KubeconfigData,
    /// Visibility restriction. `None` means visible to everyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Whitelist>,
}

/// Users and groups allowed to see a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    /// Allowed principal emails.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Allowed group names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl Whitelist {
    /// Returns true if `email` is listed. An empty email never matches.
    #[must_use]
    pub fn permits_user(&self, email: &str) -> bool {
        !email.is_empty() && self.users.iter().any(|u| u == email)
    }

    /// Returns the first of `groups` that is listed, if any.
    #[must_use]
    pub fn matching_group<'a>(&self, groups: &'a [String]) -> Option<&'a str> {
        groups
            .iter()
            .find(|g| self.groups.contains(g))
            .map(String::as_str)
    }
}

/// A kubeconfig document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigData {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<Context>,
    #[serde(
        rename = "current-context",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub current_context: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<NamedUser>,
}

/// A named cluster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub cluster: ClusterDetails,
}

/// Connection details for a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDetails {
    pub server: String,
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
    #[serde(
        rename = "insecure-skip-tls-verify",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub insecure_skip_tls_verify: bool,
}

/// A named context entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    pub context: ContextDetails,
}

/// Cluster and user a context binds together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDetails {
    pub cluster: String,
    pub user: String,
}

/// A named user entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: UserDetails,
}

/// Credential details of a user entry.
///
/// Only the `auth-provider` form is modelled; other credential kinds found
/// in source records are ignored since user entries are always replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(
        rename = "auth-provider",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_provider: Option<AuthProvider>,
}

/// An `auth-provider` credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProvider {
    pub name: String,
    pub config: AuthProviderConfig,
}

/// Configuration of the `oidc` auth provider understood by kubectl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    #[serde(rename = "client-id")]
    pub client_id: String,
    #[serde(rename = "client-secret")]
    pub client_secret: String,
    #[serde(rename = "id-token")]
    pub id_token: String,
    #[serde(rename = "idp-issuer-url")]
    pub idp_issuer_url: String,
    #[serde(
        rename = "refresh-token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist(users: &[&str], groups: &[&str]) -> Whitelist {
        Whitelist {
            users: users.iter().map(|s| s.to_string()).collect(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn whitelist_permits_listed_user() {
        let wl = whitelist(&["alice@example.com"], &[]);
        assert!(wl.permits_user("alice@example.com"));
        assert!(!wl.permits_user("bob@example.com"));
    }

    #[test]
    fn whitelist_never_permits_empty_email() {
        let wl = whitelist(&[""], &[]);
        assert!(!wl.permits_user(""));
    }

    #[test]
    fn whitelist_matching_group_returns_first_hit() {
        let wl = whitelist(&[], &["ops", "dev"]);
        let groups = vec!["qa".to_string(), "dev".to_string(), "ops".to_string()];
        assert_eq!(wl.matching_group(&groups), Some("dev"));
        assert_eq!(wl.matching_group(&["qa".to_string()]), None);
    }

    #[test]
    fn spec_parses_kubeconfig_wire_format() {
        let json = r#"{
            "name": "staging",
            "kubeconfig": {
                "apiVersion": "v1",
                "kind": "Config",
                "clusters": [{"name": "stg", "cluster": {"server": "https://stg:6443", "certificate-authority-data": "Q0E="}}],
                "contexts": [{"name": "stg", "context": {"cluster": "stg", "user": "admin"}}],
                "current-context": "stg",
                "users": [{"name": "admin", "user": {"token": "abc"}}]
            },
            "whitelist": {"groups": ["ops"]}
        }"#;

        let spec: KubeconfigSpec = serde_json::from_str(json).expect("deserialize");

        assert_eq!(spec.kubeconfig.api_version, "v1");
        assert_eq!(
            spec.kubeconfig.clusters[0].cluster.certificate_authority_data,
            Some("Q0E=".to_string())
        );
        assert_eq!(spec.kubeconfig.current_context, "stg");
        assert_eq!(spec.kubeconfig.users[0].user.auth_provider, None);
        assert_eq!(spec.whitelist, Some(whitelist(&[], &["ops"])));
    }

    #[test]
    fn spec_without_whitelist_omits_field() {
        let spec = KubeconfigSpec {
            name: "prod".to_string(),
            kubeconfig: KubeconfigData {
                api_version: "v1".to_string(),
                kind: "Config".to_string(),
                ..Default::default()
            },
            whitelist: None,
        };

        let value = serde_json::to_value(&spec).expect("serialize");
        assert!(value.get("whitelist").is_none());
        assert!(value["kubeconfig"].get("users").is_none());
    }
}
