//! PostgreSQL session store.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use kubebrowser_platform_access::{SessionData, SessionId, SessionStore, SessionStoreError};
use rootcause::Report;
use sqlx::{FromRow, PgPool};

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    data: serde_json::Value,
}

/// Session store backed by the `sessions` table.
///
/// Every save pushes `expires_at` one TTL into the future; expired rows are
/// invisible to `load` and removed by `delete_expired`.
pub struct PgSessionStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgSessionStore {
    /// Creates a new session store.
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

fn unavailable(e: sqlx::Error) -> SessionStoreError {
    SessionStoreError::Unavailable {
        details: e.to_string(),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, Report<SessionStoreError>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT data
            FROM sessions
            WHERE id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let data = serde_json::from_value(row.data).map_err(|e| SessionStoreError::Corrupt {
            session_id: id.to_string(),
            details: e.to_string(),
        })?;
        Ok(Some(data))
    }

    async fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), Report<SessionStoreError>> {
        let json = serde_json::to_value(data).map_err(|e| SessionStoreError::Corrupt {
            session_id: id.to_string(),
            details: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(id.as_str())
        .bind(json)
        .bind(Utc::now() + self.ttl)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, Report<SessionStoreError>> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}
