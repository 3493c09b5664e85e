//! 会话生命周期管理
//!
//! 客户端只持有随机令牌（cookie），服务端只保存令牌的 SHA-256 摘要作为会话 ID。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub mod cookie;
mod error;
pub mod store;
pub mod token;
mod validator;

pub use error::SessionError;
pub use store::{MemorySessionStore, PgSessionStore, RedisSessionStore, SessionStore, SessionStoreKind};
pub use validator::{SessionManager, ValidatedSession};

/// 会话记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub session_id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
