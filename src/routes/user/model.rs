use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::utils::{hash_password, verify_password};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

fn conflict_or(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some(c) if c.contains("email") => "邮箱",
                _ => "用户名",
            };
            return AppError::Conflict(format!("{}已被使用", field));
        }
    }
    AppError::Database(e)
}

impl User {
    pub async fn create(
        pool: &PgPool,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, AppError> {
        let password_hash = hash_password(password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, email, username, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, email, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(pool)
        .await
        .map_err(conflict_or)?;

        tracing::info!(user_id = %user.user_id, "Created user");
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, username, password_hash, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, username, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.password_hash)
    }

    pub async fn update_username(
        pool: &PgPool,
        user_id: Uuid,
        username: &str,
    ) -> Result<Self, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = $1
            WHERE user_id = $2
            RETURNING user_id, email, username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(conflict_or)
    }
}
