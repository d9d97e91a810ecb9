//! In-process session store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rootcause::Report;
use tokio::sync::RwLock;

use crate::error::SessionStoreError;
use crate::session::{SessionData, SessionId, SessionStore};

struct Entry {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

/// Session store backed by a process-local map.
///
/// Sessions are lost on restart and not shared between replicas. Each save
/// pushes the expiry `ttl` into the future.
pub struct MemorySessionStore {
    ttl: Duration,
    entries: RwLock<HashMap<SessionId, Entry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, Report<SessionStoreError>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(id)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.data.clone()))
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), Report<SessionStoreError>> {
        let entry = Entry {
            data: data.clone(),
            expires_at: Utc::now() + self.ttl,
        };
        self.entries.write().await.insert(id.clone(), entry);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, Report<SessionStoreError>> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(id_token: &str) -> SessionData {
        SessionData {
            id_token: Some(id_token.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = MemorySessionStore::new(Duration::hours(1));
        let id = SessionId::from("s1");

        store.save(&id, &data("T")).await.expect("save");

        assert_eq!(store.load(&id).await.expect("load"), Some(data("T")));
        assert_eq!(store.load(&SessionId::from("s2")).await.expect("load"), None);
    }

    #[tokio::test]
    async fn expired_sessions_load_as_none() {
        let store = MemorySessionStore::new(Duration::seconds(-1));
        let id = SessionId::from("s1");

        store.save(&id, &data("T")).await.expect("save");

        assert_eq!(store.load(&id).await.expect("load"), None);
    }

    #[tokio::test]
    async fn delete_expired_removes_only_stale_entries() {
        let stale = MemorySessionStore::new(Duration::seconds(-1));
        stale.save(&SessionId::from("old"), &data("T")).await.expect("save");
        assert_eq!(stale.delete_expired().await.expect("delete"), 1);
        assert!(stale.is_empty().await);

        let live = MemorySessionStore::new(Duration::hours(1));
        live.save(&SessionId::from("new"), &data("T")).await.expect("save");
        assert_eq!(live.delete_expired().await.expect("delete"), 0);
        assert_eq!(live.len().await, 1);
    }
}
