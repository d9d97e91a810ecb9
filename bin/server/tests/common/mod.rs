#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use kubebrowser_core::{
    Cluster, ClusterDetails, ConfigRecord, Context, ContextDetails, KubeconfigData,
    KubeconfigSpec, NamedUser, UserDetails, Whitelist,
};
use kubebrowser_platform_access::{
    ClaimsExtractor, IdentityProvider, IdpError, Materializer, MemorySessionStore,
    ProviderCredentials, SessionData, SessionId, SessionStore, SessionStoreError, TokenSet,
    VerifiedIdToken,
};
use kubebrowser_records::{Selector, StaticRecordSource};
use kubebrowser_server::app::{AppSettings, AppState, build_router};
use kubebrowser_server::auth::SESSION_COOKIE;
use rootcause::Report;
use tower::ServiceExt;

pub const ISSUER: &str = "https://idp.example.com";
pub const AUTHORIZE_URL: &str = "https://idp.example.com/authorize";
pub const SESSION_ID: &str = "test-session";

const GOOD_SIGNATURE: &str = "good-signature";

/// Builds a compact JWT the fake provider accepts.
pub fn jwt(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.{GOOD_SIGNATURE}")
}

/// Builds a token for `email` expiring `expires_in` from now.
pub fn id_token(email: &str, groups: &[&str], expires_in: Duration, nonce: Option<&str>) -> String {
    let mut claims = serde_json::json!({
        "iss": ISSUER,
        "aud": "kubebrowser",
        "sub": email,
        "email": email,
        "groups": groups,
        "exp": (Utc::now() + expires_in).timestamp(),
    });
    if let Some(nonce) = nonce {
        claims["nonce"] = serde_json::json!(nonce);
    }
    jwt(claims)
}

/// Replaces the signature segment so the fake provider rejects the token.
pub fn forge(token: &str) -> String {
    let (signed, _) = token.rsplit_once('.').expect("compact JWT");
    format!("{signed}.forged")
}

/// Scripted identity provider.
///
/// Codes and refresh tokens map to canned token sets; anything unknown is
/// rejected. Every call is counted.
#[derive(Default)]
pub struct FakeIdp {
    codes: Mutex<HashMap<String, TokenSet>>,
    refreshes: Mutex<HashMap<String, TokenSet>>,
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl FakeIdp {
    pub fn on_code(&self, code: &str, tokens: TokenSet) {
        self.codes
            .lock()
            .expect("lock")
            .insert(code.to_string(), tokens);
    }

    pub fn on_refresh(&self, refresh_token: &str, tokens: TokenSet) {
        self.refreshes
            .lock()
            .expect("lock")
            .insert(refresh_token.to_string(), tokens);
    }

    pub fn exchanges(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn verifications(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdp {
    fn authorization_url(&self, state: &str, nonce: &str) -> String {
        format!("{AUTHORIZE_URL}?response_type=code&state={state}&nonce={nonce}")
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, Report<IdpError>> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.codes
            .lock()
            .expect("lock")
            .get(code)
            .cloned()
            .ok_or_else(|| {
                IdpError::TokenExchange {
                    reason: "invalid_grant".to_string(),
                }
                .into()
            })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, Report<IdpError>> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshes
            .lock()
            .expect("lock")
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| {
                IdpError::Refresh {
                    reason: "invalid_grant".to_string(),
                }
                .into()
            })
    }

    async fn verify(&self, raw: &str) -> Result<VerifiedIdToken, Report<IdpError>> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let invalid = |reason: &str| -> Report<IdpError> {
            IdpError::TokenValidation {
                reason: reason.to_string(),
            }
            .into()
        };

        let segments: Vec<&str> = raw.split('.').collect();
        let [_, payload, signature] = segments.as_slice() else {
            return Err(invalid("malformed"));
        };
        if *signature != GOOD_SIGNATURE {
            return Err(invalid("bad signature"));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| invalid("bad payload"))?;
        let claims: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|_| invalid("bad payload"))?;

        let exp = claims["exp"].as_i64().ok_or_else(|| invalid("no exp"))?;
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or_else(|| invalid("bad exp"))?;
        let nonce = claims["nonce"].as_str().map(str::to_string);

        Ok(VerifiedIdToken::new(raw.to_string(), expires_at, nonce))
    }
}

/// Session store whose saves start failing after a fixed number succeed.
pub struct FlakySessionStore {
    inner: Arc<MemorySessionStore>,
    saves_left: AtomicUsize,
}

impl FlakySessionStore {
    pub fn new(inner: Arc<MemorySessionStore>, successful_saves: usize) -> Self {
        Self {
            inner,
            saves_left: AtomicUsize::new(successful_saves),
        }
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, Report<SessionStoreError>> {
        self.inner.load(id).await
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), Report<SessionStoreError>> {
        let allowed = self
            .saves_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(SessionStoreError::Unavailable {
                details: "connection reset".to_string(),
            }
            .into());
        }
        self.inner.save(id, data).await
    }

    async fn delete_expired(&self) -> Result<u64, Report<SessionStoreError>> {
        self.inner.delete_expired().await
    }
}

/// An assembled router wired to in-process collaborators.
pub struct TestApp {
    pub router: Router,
    pub idp: Arc<FakeIdp>,
    pub sessions: Arc<MemorySessionStore>,
    key: Key,
}

impl TestApp {
    pub fn new(records: Vec<ConfigRecord>) -> Self {
        let sessions = Arc::new(MemorySessionStore::new(Duration::hours(1)));
        Self::build(records, sessions.clone(), sessions)
    }

    /// Lets the first `successful_saves` session saves through, then fails.
    pub fn with_failing_saves(records: Vec<ConfigRecord>, successful_saves: usize) -> Self {
        let sessions = Arc::new(MemorySessionStore::new(Duration::hours(1)));
        let flaky = Arc::new(FlakySessionStore::new(sessions.clone(), successful_saves));
        Self::build(records, sessions, flaky)
    }

    fn build(
        records: Vec<ConfigRecord>,
        sessions: Arc<MemorySessionStore>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let idp = Arc::new(FakeIdp::default());
        let key = Key::from(&[7u8; 64]);

        let state = Arc::new(AppState {
            idp: idp.clone(),
            sessions: store,
            records: Arc::new(StaticRecordSource::new(records)),
            claims: ClaimsExtractor::default(),
            materializer: Materializer::new(ProviderCredentials {
                client_id: "kubebrowser".to_string(),
                client_secret: "s3cret".to_string(),
                issuer_url: ISSUER.to_string(),
            }),
            settings: AppSettings {
                namespace: "default".to_string(),
                selector: Selector::everything(),
                session_key: key.clone(),
                session_ttl: Duration::hours(1),
                secure_cookies: false,
                static_dir: None,
            },
        });

        Self {
            router: build_router(state),
            idp,
            sessions,
            key,
        }
    }

    /// Stores `data` under [`SESSION_ID`] and returns a matching `Cookie` header pair.
    pub async fn seed_session(&self, data: SessionData) -> String {
        self.sessions
            .save(&SessionId::from(SESSION_ID), &data)
            .await
            .expect("seed session");

        let jar = SignedCookieJar::new(self.key.clone())
            .add(Cookie::new(SESSION_COOKIE, SESSION_ID));
        let response = jar.into_response();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("signed cookie");
        cookie_pair(set_cookie).to_string()
    }

    /// Returns the stored session.
    pub async fn session(&self) -> SessionData {
        self.sessions
            .load(&SessionId::from(SESSION_ID))
            .await
            .expect("load session")
            .expect("session exists")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response")
    }
}

/// Returns the `name=value` part of a `Set-Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or_default().trim()
}

/// Returns every `Set-Cookie` header of a response.
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Returns the value a response sets for cookie `name`.
pub fn cookie_value(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response).into_iter().find_map(|c| {
        cookie_pair(&c)
            .strip_prefix(&prefix)
            .map(str::to_string)
    })
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn record(name: &str, whitelist: Option<Whitelist>) -> ConfigRecord {
    ConfigRecord::new(
        "default",
        name,
        KubeconfigSpec {
            name: name.to_string(),
            kubeconfig: KubeconfigData {
                api_version: "v1".to_string(),
                kind: "Config".to_string(),
                clusters: vec![Cluster {
                    name: "main".to_string(),
                    cluster: ClusterDetails {
                        server: format!("https://{name}.example.com:6443"),
                        ..Default::default()
                    },
                }],
                contexts: vec![Context {
                    name: format!("{name}-admin"),
                    context: ContextDetails {
                        cluster: "main".to_string(),
                        user: "admin".to_string(),
                    },
                }],
                current_context: format!("{name}-admin"),
                users: vec![NamedUser {
                    name: "admin".to_string(),
                    user: UserDetails::default(),
                }],
            },
            whitelist,
        },
    )
}

pub fn whitelist(users: &[&str], groups: &[&str]) -> Option<Whitelist> {
    Some(Whitelist {
        users: users.iter().map(|u| u.to_string()).collect(),
        groups: groups.iter().map(|g| g.to_string()).collect(),
    })
}
