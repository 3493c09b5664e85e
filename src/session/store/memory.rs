use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SessionStore;
use crate::session::{Session, SessionError};

/// 进程内会话存储，本地开发与测试使用
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}
