use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient, Script, aio::MultiplexedConnection};
use uuid::Uuid;

use super::SessionStore;
use crate::session::{Session, SessionError};

/// Redis 会话存储
///
/// 会话以 JSON 存在 `session:{id}`，TTL 等于剩余有效期；
/// `user_sessions:{user_id}` 集合记录用户的全部会话 ID，用于全部登出，
/// 其 TTL 不短于集合内最晚过期的会话。
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: Arc<RedisClient>,
}

// KEYS[1] = 索引集合, ARGV[1] = 会话 ID, ARGV[2] = 会话 TTL（秒）
// 索引 TTL 只延长不缩短；无 TTL 的新集合返回 -1
const INDEX_SESSION_SCRIPT: &str = r#"
redis.call('SADD', KEYS[1], ARGV[1])
local ttl = redis.call('TTL', KEYS[1])
if ttl < tonumber(ARGV[2]) then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return 1
"#;

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

fn user_sessions_key(user_id: Uuid) -> String {
    format!("user_sessions:{}", user_id)
}

/// 剩余秒数，至少 1 秒（SET EX 不接受 0）
fn remaining_ttl(expires_at: DateTime<Utc>) -> u64 {
    (expires_at - Utc::now()).num_seconds().max(1) as u64
}

impl RedisSessionStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    async fn index_session(
        &self,
        conn: &mut MultiplexedConnection,
        session: &Session,
        ttl: u64,
    ) -> Result<(), SessionError> {
        let _: i64 = Script::new(INDEX_SESSION_SCRIPT)
            .key(user_sessions_key(session.user_id))
            .arg(&session.session_id)
            .arg(ttl)
            .invoke_async(conn)
            .await?;
        Ok(())
    }
}

impl SessionStore for RedisSessionStore {
    async fn insert(&self, session: &Session) -> Result<(), SessionError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(session)?;
        let ttl = remaining_ttl(session.expires_at);

        let _: () = conn
            .set_ex(session_key(&session.session_id), json, ttl)
            .await?;
        self.index_session(&mut conn, session, ttl).await
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn.get(session_key(session_id)).await?;

        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn update_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let Some(mut session) = self.find(session_id).await? else {
            return Ok(());
        };
        session.expires_at = expires_at;

        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(&session)?;
        let ttl = remaining_ttl(expires_at);

        // XX：读取之后被删除（登出）的会话不会被重新写回
        let written: Option<String> = redis::cmd("SET")
            .arg(session_key(session_id))
            .arg(json)
            .arg("XX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;

        if written.is_some() {
            self.index_session(&mut conn, &session, ttl).await?;
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let session = self.find(session_id).await?;

        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.del(session_key(session_id)).await?;
        if let Some(session) = session {
            let _: () = conn
                .srem(user_sessions_key(session.user_id), session_id)
                .await?;
        }

        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let index_key = user_sessions_key(user_id);
        let session_ids: Vec<String> = conn.smembers(&index_key).await?;
        if session_ids.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = session_ids.iter().map(|id| session_key(id)).collect();
        // 索引中可能残留已因 TTL 消失的会话，只统计实际删除的键
        let removed: u64 = conn.del(keys).await?;
        let _: () = conn.del(&index_key).await?;

        Ok(removed)
    }
}
