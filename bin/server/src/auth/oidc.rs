//! OIDC client implementation using the openidconnect crate.

use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kubebrowser_platform_access::{IdentityProvider, IdpError, OidcConfig, TokenSet, VerifiedIdToken};
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreIdToken, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClaimsVerificationError, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    OAuth2TokenResponse, RedirectUrl, RefreshToken, Scope,
};
use rootcause::Report;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Minimum delay between two provider metadata refreshes.
const REDISCOVERY_INTERVAL: Duration = Duration::from_secs(60);

/// OIDC client for authenticating users.
///
/// Provider metadata, including the signing keys, is discovered once at
/// start-up. A token that fails signature verification triggers a
/// throttled re-discovery so rotated keys are picked up.
pub struct OidcClient {
    provider_metadata: RwLock<CoreProviderMetadata>,
    last_discovery: Mutex<Instant>,
    issuer_url: IssuerUrl,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
    http_client: reqwest::Client,
}

impl OidcClient {
    /// Creates a new OIDC client by discovering the provider metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is invalid or discovery fails.
    pub async fn discover(
        config: &OidcConfig,
        redirect_uri: String,
    ) -> Result<Self, Report<IdpError>> {
        let issuer_url =
            IssuerUrl::new(config.issuer_url().to_string()).map_err(|e| IdpError::Configuration {
                reason: format!("invalid issuer URL: {e}"),
            })?;

        let redirect_url = RedirectUrl::new(redirect_uri).map_err(|e| IdpError::Configuration {
            reason: format!("invalid redirect URI: {e}"),
        })?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| IdpError::Configuration {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url.clone(), &http_client)
            .await
            .map_err(|e| IdpError::Discovery {
                reason: format!("failed to discover provider: {e}"),
            })?;

        info!(issuer = %issuer_url.as_str(), "discovered OIDC provider");

        Ok(Self {
            provider_metadata: RwLock::new(provider_metadata),
            last_discovery: Mutex::new(Instant::now()),
            issuer_url,
            client_id: ClientId::new(config.client_id().to_string()),
            client_secret: ClientSecret::new(config.client_secret().to_string()),
            redirect_url,
            scopes: config.scopes().into_iter().map(str::to_string).collect(),
            http_client,
        })
    }

    fn metadata(&self) -> CoreProviderMetadata {
        self.provider_metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-fetches provider metadata unless it was fetched recently.
    ///
    /// Returns true if new metadata was installed.
    async fn rediscover(&self) -> bool {
        let mut last = self.last_discovery.lock().await;
        if last.elapsed() < REDISCOVERY_INTERVAL {
            debug!("provider metadata refreshed recently, not re-discovering");
            return false;
        }
        *last = Instant::now();

        match CoreProviderMetadata::discover_async(self.issuer_url.clone(), &self.http_client).await
        {
            Ok(metadata) => {
                *self
                    .provider_metadata
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = metadata;
                info!("refreshed OIDC provider metadata");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to refresh OIDC provider metadata");
                false
            }
        }
    }

    /// Verifies `id_token` against the current metadata.
    fn verify_with_current_keys(
        &self,
        id_token: &CoreIdToken,
        raw: &str,
    ) -> Result<VerifiedIdToken, ClaimsVerificationError> {
        let client = CoreClient::from_provider_metadata(
            self.metadata(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        // The nonce is compared against the login cookie by the callback.
        let claims = id_token.claims(&client.id_token_verifier(), |_: Option<&Nonce>| {
            Ok::<(), String>(())
        })?;

        Ok(VerifiedIdToken::new(
            raw.to_string(),
            claims.expiration(),
            claims.nonce().map(|n| n.secret().clone()),
        ))
    }
}

/// Reads the raw ID token out of a token endpoint response.
fn raw_id_token<TR>(token_response: &TR) -> Option<String>
where
    TR: serde::Serialize,
{
    // The response serializes back to its wire form, which holds the raw JWT.
    let response_json = serde_json::to_value(token_response).ok()?;
    response_json
        .get("id_token")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn authorization_url(&self, state: &str, nonce: &str) -> String {
        let client = CoreClient::from_provider_metadata(
            self.metadata(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let state = state.to_string();
        let nonce = nonce.to_string();
        let mut auth_request = client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state),
            move || Nonce::new(nonce),
        );

        // "openid" is always sent by the client itself.
        for scope in self.scopes.iter().filter(|s| s.as_str() != "openid") {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, _, _) = auth_request.url();
        auth_url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, Report<IdpError>> {
        let client = CoreClient::from_provider_metadata(
            self.metadata(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let token_request = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| IdpError::Configuration {
                reason: format!("token endpoint error: {e}"),
            })?;

        let token_response = token_request
            .request_async(&self.http_client)
            .await
            .map_err(|e| IdpError::TokenExchange {
                reason: e.to_string(),
            })?;

        Ok(TokenSet {
            id_token: raw_id_token(&token_response),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, Report<IdpError>> {
        let client = CoreClient::from_provider_metadata(
            self.metadata(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let token_request = client
            .exchange_refresh_token(&refresh_token)
            .map_err(|e| IdpError::Configuration {
                reason: format!("token endpoint error: {e}"),
            })?;

        let token_response = token_request
            .request_async(&self.http_client)
            .await
            .map_err(|e| IdpError::Refresh {
                reason: e.to_string(),
            })?;

        Ok(TokenSet {
            id_token: raw_id_token(&token_response),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
        })
    }

    async fn verify(&self, raw_id_token: &str) -> Result<VerifiedIdToken, Report<IdpError>> {
        let id_token = CoreIdToken::from_str(raw_id_token).map_err(|e| IdpError::TokenValidation {
            reason: format!("malformed ID token: {e}"),
        })?;

        let result = match self.verify_with_current_keys(&id_token, raw_id_token) {
            Err(ClaimsVerificationError::SignatureVerification(e)) => {
                debug!(error = %e, "ID token signature rejected");
                if self.rediscover().await {
                    self.verify_with_current_keys(&id_token, raw_id_token)
                } else {
                    Err(ClaimsVerificationError::SignatureVerification(e))
                }
            }
            other => other,
        };

        result.map_err(|e| {
            IdpError::TokenValidation {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("issuer_url", &self.issuer_url.as_str())
            .field("client_id", &self.client_id.as_str())
            .field("redirect_url", &self.redirect_url.as_str())
            .finish_non_exhaustive()
    }
}
