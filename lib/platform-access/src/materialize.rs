//! Per-user kubeconfig materialization.
//!
//! Source records carry cluster and context entries but never credentials
//! meant for end users. The materializer replaces every user entry with a
//! single `oidc` auth-provider user holding the caller's own tokens, so the
//! downloaded file works with kubectl's built-in OIDC refresh.

use kubebrowser_core::{
    AuthProvider, AuthProviderConfig, ConfigRecord, KubeconfigData, NamedUser, UserDetails,
};
use serde::Serialize;
use tracing::warn;

use crate::oidc::OidcConfig;

/// Name of the synthesized user entry.
pub const OIDC_USER_NAME: &str = "oidc";

/// Client credentials embedded into materialized kubeconfigs.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub issuer_url: String,
}

impl From<&OidcConfig> for ProviderCredentials {
    fn from(config: &OidcConfig) -> Self {
        Self {
            client_id: config.client_id().to_string(),
            client_secret: config.client_secret().to_string(),
            issuer_url: config.issuer_url().to_string(),
        }
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("issuer_url", &self.issuer_url)
            .finish()
    }
}

/// A kubeconfig ready to hand to one user. Carries no whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedKubeconfig {
    pub name: String,
    pub kubeconfig: KubeconfigData,
}

/// Builds per-user kubeconfigs from records.
#[derive(Debug, Clone)]
pub struct Materializer {
    credentials: ProviderCredentials,
}

impl Materializer {
    #[must_use]
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self { credentials }
    }

    /// Materializes one record for the holder of `id_token`.
    ///
    /// Only the first context is kept and it is bound to the `oidc` user.
    /// Returns `None` for records with no contexts. The source record is
    /// left untouched.
    #[must_use]
    pub fn materialize(
        &self,
        record: &ConfigRecord,
        id_token: &str,
        refresh_token: Option<&str>,
    ) -> Option<MaterializedKubeconfig> {
        let mut kubeconfig = record.spec.kubeconfig.clone();

        kubeconfig.contexts.truncate(1);
        let Some(context) = kubeconfig.contexts.first_mut() else {
            warn!(
                namespace = %record.namespace,
                record = %record.name,
                "record has no contexts, skipping"
            );
            return None;
        };
        context.context.user = OIDC_USER_NAME.to_string();
        kubeconfig.current_context = context.name.clone();

        kubeconfig.users = vec![NamedUser {
            name: OIDC_USER_NAME.to_string(),
            user: UserDetails {
                auth_provider: Some(AuthProvider {
                    name: OIDC_USER_NAME.to_string(),
                    config: AuthProviderConfig {
                        client_id: self.credentials.client_id.clone(),
                        client_secret: self.credentials.client_secret.clone(),
                        id_token: id_token.to_string(),
                        idp_issuer_url: self.credentials.issuer_url.clone(),
                        refresh_token: refresh_token.map(str::to_string),
                    },
                }),
            },
        }];

        Some(MaterializedKubeconfig {
            name: record.spec.name.clone(),
            kubeconfig,
        })
    }

    /// Materializes every record, skipping those with no contexts.
    pub fn materialize_all<'a, I>(
        &self,
        records: I,
        id_token: &str,
        refresh_token: Option<&str>,
    ) -> Vec<MaterializedKubeconfig>
    where
        I: IntoIterator<Item = &'a ConfigRecord>,
    {
        records
            .into_iter()
            .filter_map(|record| self.materialize(record, id_token, refresh_token))
            .collect()
    }
}
