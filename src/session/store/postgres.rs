use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::SessionStore;
use crate::session::{Session, SessionError};

/// `sessions` 表
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.session_id.as_str())
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT session_id, user_id, created_at, expires_at
            FROM sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        sqlx::query("UPDATE sessions SET expires_at = $1 WHERE session_id = $2")
            .bind(expires_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
