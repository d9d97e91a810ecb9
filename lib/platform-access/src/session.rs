//! Per-browser sessions.
//!
//! A session is keyed by an opaque identifier carried in a signed cookie and
//! holds the route to return to after login plus the user's current tokens.
//! Request handlers work on a [`Session`] handle; persistence goes through a
//! [`SessionStore`] so the storage backend can be swapped.

use std::sync::Arc;

use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SessionStoreError;

/// Unique identifier for a session.
///
/// Session IDs are opaque strings generated during session creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session ID from a string.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Generates a fresh, unguessable session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Keys stored in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Request URI to return to once login completes.
    InitialRoute,
    /// Raw ID token.
    IdToken,
    /// Refresh token.
    RefreshToken,
}

impl SessionKey {
    /// Returns the key's storage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialRoute => "initial_route",
            Self::IdToken => "id_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted contents of a session.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl SessionData {
    fn slot(&mut self, key: SessionKey) -> &mut Option<String> {
        match key {
            SessionKey::InitialRoute => &mut self.initial_route,
            SessionKey::IdToken => &mut self.id_token,
            SessionKey::RefreshToken => &mut self.refresh_token,
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: SessionKey) -> Option<&str> {
        match key {
            SessionKey::InitialRoute => self.initial_route.as_deref(),
            SessionKey::IdToken => self.id_token.as_deref(),
            SessionKey::RefreshToken => self.refresh_token.as_deref(),
        }
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("initial_route", &self.initial_route)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Storage backend for sessions.
///
/// Implementations own expiry: a session not saved within the configured
/// lifetime must load as `None`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session, returning `None` if unknown or expired.
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, Report<SessionStoreError>>;

    /// Persists a session and extends its lifetime.
    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), Report<SessionStoreError>>;

    /// Removes expired sessions, returning how many were deleted.
    async fn delete_expired(&self) -> Result<u64, Report<SessionStoreError>>;
}

/// A request-scoped handle on one session.
///
/// Clones share state, so the auth guard and downstream handlers see each
/// other's writes within a request.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    is_new: bool,
    data: Arc<Mutex<SessionData>>,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Loads the session named by the cookie, or starts a new one.
    ///
    /// An unknown or expired ID is replaced with a freshly generated one so
    /// that clients cannot choose their own session identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn load(
        store: Arc<dyn SessionStore>,
        id: Option<SessionId>,
    ) -> Result<Self, Report<SessionStoreError>> {
        if let Some(id) = id {
            if let Some(data) = store.load(&id).await? {
                return Ok(Self {
                    id,
                    is_new: false,
                    data: Arc::new(Mutex::new(data)),
                    store,
                });
            }
            debug!(session_id = %id, "session not found, starting a new one");
        }

        Ok(Self {
            id: SessionId::generate(),
            is_new: true,
            data: Arc::new(Mutex::new(SessionData::default())),
            store,
        })
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns true if the session did not exist before this request.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns the value stored under `key`.
    pub async fn get(&self, key: SessionKey) -> Option<String> {
        self.data.lock().await.get(key).map(str::to_string)
    }

    /// Stores `value` under `key`. Only takes effect once saved.
    pub async fn set(&self, key: SessionKey, value: impl Into<String>) {
        *self.data.lock().await.slot(key) = Some(value.into());
    }

    /// Removes the value stored under `key`.
    pub async fn remove(&self, key: SessionKey) {
        *self.data.lock().await.slot(key) = None;
    }

    /// Returns a copy of the current contents.
    pub async fn snapshot(&self) -> SessionData {
        self.data.lock().await.clone()
    }

    /// Persists the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn save(&self) -> Result<(), Report<SessionStoreError>> {
        let data = self.snapshot().await;
        self.store.save(&self.id, &data).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("is_new", &self.is_new)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemorySessionStore;
    use chrono::Duration;

    fn store() -> Arc<dyn SessionStore> {
        Arc::new(MemorySessionStore::new(Duration::hours(1)))
    }

    #[test]
    fn session_id_display() {
        let id = SessionId::new("sess_test_123".to_string());
        assert_eq!(id.to_string(), "sess_test_123");
    }

    #[test]
    fn session_id_from_str() {
        let id: SessionId = "test_session".into();
        assert_eq!(id.as_str(), "test_session");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn session_keys_have_stable_names() {
        assert_eq!(SessionKey::InitialRoute.as_str(), "initial_route");
        assert_eq!(SessionKey::IdToken.as_str(), "id_token");
        assert_eq!(SessionKey::RefreshToken.as_str(), "refresh_token");
    }

    #[test]
    fn session_data_debug_redacts_tokens() {
        let data = SessionData {
            initial_route: Some("/home".to_string()),
            id_token: Some("eyJ.secret.sig".to_string()),
            refresh_token: Some("refresh-secret".to_string()),
        };

        let rendered = format!("{data:?}");
        assert!(rendered.contains("/home"));
        assert!(!rendered.contains("eyJ"));
        assert!(!rendered.contains("refresh-secret"));
    }

    #[tokio::test]
    async fn unknown_id_starts_new_session() {
        let requested = SessionId::from("made-up");
        let session = Session::load(store(), Some(requested.clone()))
            .await
            .expect("load");

        assert!(session.is_new());
        assert_ne!(session.id(), &requested);
        assert_eq!(session.get(SessionKey::IdToken).await, None);
    }

    #[tokio::test]
    async fn saved_values_survive_reload() {
        let store = store();
        let session = Session::load(store.clone(), None).await.expect("load");
        session.set(SessionKey::InitialRoute, "/home").await;
        session.set(SessionKey::IdToken, "T1").await;
        session.save().await.expect("save");

        let reloaded = Session::load(store, Some(session.id().clone()))
            .await
            .expect("reload");

        assert!(!reloaded.is_new());
        assert_eq!(reloaded.id(), session.id());
        assert_eq!(reloaded.get(SessionKey::InitialRoute).await.as_deref(), Some("/home"));
        assert_eq!(reloaded.get(SessionKey::IdToken).await.as_deref(), Some("T1"));
        assert_eq!(reloaded.get(SessionKey::RefreshToken).await, None);
    }

    #[tokio::test]
    async fn unsaved_values_are_not_persisted() {
        let store = store();
        let session = Session::load(store.clone(), None).await.expect("load");
        session.set(SessionKey::IdToken, "T1").await;
        session.save().await.expect("save");
        session.set(SessionKey::IdToken, "T2").await;

        let reloaded = Session::load(store, Some(session.id().clone()))
            .await
            .expect("reload");
        assert_eq!(reloaded.get(SessionKey::IdToken).await.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let session = Session::load(store(), None).await.expect("load");
        let other = session.clone();
        other.set(SessionKey::RefreshToken, "R").await;

        assert_eq!(session.get(SessionKey::RefreshToken).await.as_deref(), Some("R"));

        session.remove(SessionKey::RefreshToken).await;
        assert_eq!(other.get(SessionKey::RefreshToken).await, None);
    }

    #[test]
    fn session_data_serializes_sparse() {
        let data = SessionData {
            initial_route: Some("/".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&data).expect("serialize");
        assert_eq!(json, serde_json::json!({ "initial_route": "/" }));
    }
}
