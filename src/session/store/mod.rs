use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Session, SessionError};

mod memory;
mod postgres;
mod redis_store;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;
pub use redis_store::RedisSessionStore;

/// 会话持久化接口，所有键均为推导出的会话 ID
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: &Session) -> impl Future<Output = Result<(), SessionError>> + Send;

    fn find(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send;

    /// 不存在的会话视为成功
    fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// 不存在的会话视为成功
    fn delete(&self, session_id: &str) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// 返回删除的会话数
    fn delete_user_sessions(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<u64, SessionError>> + Send;
}

/// 运行时按配置选择的存储后端
#[derive(Clone)]
pub enum SessionStoreKind {
    Postgres(PgSessionStore),
    Redis(RedisSessionStore),
    Memory(MemorySessionStore),
}

impl SessionStore for SessionStoreKind {
    async fn insert(&self, session: &Session) -> Result<(), SessionError> {
        match self {
            Self::Postgres(store) => store.insert(session).await,
            Self::Redis(store) => store.insert(session).await,
            Self::Memory(store) => store.insert(session).await,
        }
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        match self {
            Self::Postgres(store) => store.find(session_id).await,
            Self::Redis(store) => store.find(session_id).await,
            Self::Memory(store) => store.find(session_id).await,
        }
    }

    async fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        match self {
            Self::Postgres(store) => store.update_expiry(session_id, expires_at).await,
            Self::Redis(store) => store.update_expiry(session_id, expires_at).await,
            Self::Memory(store) => store.update_expiry(session_id, expires_at).await,
        }
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        match self {
            Self::Postgres(store) => store.delete(session_id).await,
            Self::Redis(store) => store.delete(session_id).await,
            Self::Memory(store) => store.delete(session_id).await,
        }
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, SessionError> {
        match self {
            Self::Postgres(store) => store.delete_user_sessions(user_id).await,
            Self::Redis(store) => store.delete_user_sessions(user_id).await,
            Self::Memory(store) => store.delete_user_sessions(user_id).await,
        }
    }
}
