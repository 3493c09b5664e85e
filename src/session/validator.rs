use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::store::{SessionStore, SessionStoreKind};
use super::token::{generate_session_token, is_well_formed, session_id_from_token};
use super::{Session, SessionError};

/// 校验通过的会话
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub session: Session,
    /// 本次校验是否延长了有效期（需要重新下发 cookie）
    pub refreshed: bool,
}

/// 会话的创建、校验与注销
///
/// 两级过期：会话距到期不足 `refresh_window` 时被访问，有效期重置为
/// `now + max_duration`；超过 `expires_at` 的会话在下一次校验时删除。
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<SessionStoreKind>,
    max_duration: Duration,
    refresh_window: Duration,
}

impl SessionManager {
    pub fn new(
        store: SessionStoreKind,
        max_duration: std::time::Duration,
        refresh_window: std::time::Duration,
    ) -> Result<Self, SessionError> {
        let max_duration =
            Duration::from_std(max_duration).map_err(|_| SessionError::ExpiryOutOfRange)?;
        let refresh_window =
            Duration::from_std(refresh_window).map_err(|_| SessionError::ExpiryOutOfRange)?;

        Ok(Self {
            store: Arc::new(store),
            max_duration,
            refresh_window,
        })
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SessionError> {
        now.checked_add_signed(self.max_duration)
            .ok_or(SessionError::ExpiryOutOfRange)
    }

    /// 创建会话，返回交给客户端的令牌与会话记录
    pub async fn create_session(&self, user_id: Uuid) -> Result<(String, Session), SessionError> {
        self.create_session_at(user_id, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(String, Session), SessionError> {
        let expires_at = self.expiry_from(now)?;
        let token = generate_session_token();
        let session = Session {
            session_id: session_id_from_token(&token),
            user_id,
            created_at: now,
            expires_at,
        };

        self.store.insert(&session).await?;
        tracing::info!(user_id = %user_id, "Created session");

        Ok((token, session))
    }

    pub async fn validate_session_token(
        &self,
        token: &str,
    ) -> Result<ValidatedSession, SessionError> {
        self.validate_session_token_at(token, Utc::now()).await
    }

    pub async fn validate_session_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidatedSession, SessionError> {
        if !is_well_formed(token) {
            return Err(SessionError::NotAuthenticated);
        }

        let session_id = session_id_from_token(token);
        let Some(mut session) = self.store.find(&session_id).await? else {
            return Err(SessionError::NotAuthenticated);
        };

        if session.is_expired_at(now) {
            self.store.delete(&session_id).await?;
            tracing::debug!(user_id = %session.user_id, "Removed expired session");
            return Err(SessionError::SessionExpired);
        }

        let refresh_from = session
            .expires_at
            .checked_sub_signed(self.refresh_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let refreshed = now >= refresh_from;
        if refreshed {
            session.expires_at = self.expiry_from(now)?;
            self.store
                .update_expiry(&session_id, session.expires_at)
                .await?;
            tracing::debug!(user_id = %session.user_id, expires_at = %session.expires_at, "Refreshed session");
        }

        Ok(ValidatedSession { session, refreshed })
    }

    pub async fn invalidate_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.delete(session_id).await
    }

    /// 注销用户的全部会话，返回注销数量
    pub async fn invalidate_user_sessions(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let removed = self.store.delete_user_sessions(user_id).await?;
        tracing::info!(user_id = %user_id, removed, "Invalidated all user sessions");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    const DAY: u64 = 24 * 3600;

    fn manager() -> (SessionManager, MemorySessionStore) {
        let store = MemorySessionStore::new();
        let manager = SessionManager::new(
            SessionStoreKind::Memory(store.clone()),
            std::time::Duration::from_secs(30 * DAY),
            std::time::Duration::from_secs(15 * DAY),
        )
        .unwrap();
        (manager, store)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_an_error_not_a_panic() {
        let store = MemorySessionStore::new();
        let manager = SessionManager::new(
            SessionStoreKind::Memory(store.clone()),
            std::time::Duration::from_secs(100_000_000 * DAY),
            std::time::Duration::from_secs(DAY),
        )
        .unwrap();

        let err = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap_err();
        assert!(matches!(err, SessionError::ExpiryOutOfRange));
        assert!(store.is_empty().await);

        let overflow = SessionManager::new(
            SessionStoreKind::Memory(MemorySessionStore::new()),
            std::time::Duration::from_secs(u64::MAX),
            std::time::Duration::from_secs(DAY),
        );
        assert!(matches!(overflow, Err(SessionError::ExpiryOutOfRange)));
    }

    #[tokio::test]
    async fn created_session_stores_only_derived_id() {
        let (manager, store) = manager();
        let (token, session) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        assert_eq!(session.session_id, session_id_from_token(&token));
        assert_eq!(session.expires_at, t0() + Duration::days(30));
        assert!(store.find(&token).await.unwrap().is_none());
        assert!(store.find(&session.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn validation_before_refresh_window_keeps_expiry() {
        let (manager, store) = manager();
        let (token, session) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        for offset in [0, 1, 10, 14] {
            let validated = manager
                .validate_session_token_at(&token, t0() + Duration::days(offset))
                .await
                .unwrap();
            assert!(!validated.refreshed);
            assert_eq!(validated.session.expires_at, session.expires_at);
        }
        let stored = store.find(&session.session_id).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, session.expires_at);
    }

    #[tokio::test]
    async fn validation_inside_refresh_window_extends_expiry() {
        let (manager, store) = manager();
        let (token, session) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        let now = t0() + Duration::days(20);
        let validated = manager.validate_session_token_at(&token, now).await.unwrap();

        assert!(validated.refreshed);
        assert_eq!(validated.session.expires_at, now + Duration::days(30));
        let stored = store.find(&session.session_id).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, now + Duration::days(30));
    }

    #[tokio::test]
    async fn refresh_window_starts_exactly_at_boundary() {
        let (manager, _) = manager();
        let (token, _) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        let just_before = t0() + Duration::days(15) - Duration::seconds(1);
        let validated = manager
            .validate_session_token_at(&token, just_before)
            .await
            .unwrap();
        assert!(!validated.refreshed);

        let boundary = t0() + Duration::days(15);
        let validated = manager.validate_session_token_at(&token, boundary).await.unwrap();
        assert!(validated.refreshed);
        assert_eq!(validated.session.expires_at, boundary + Duration::days(30));
    }

    #[tokio::test]
    async fn expired_session_is_removed() {
        let (manager, store) = manager();
        let (token, session) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        let err = manager
            .validate_session_token_at(&token, t0() + Duration::days(31))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionExpired));
        assert!(store.find(&session.session_id).await.unwrap().is_none());

        // 再次校验同样失败，且不产生存储错误
        let err = manager
            .validate_session_token_at(&token, t0() + Duration::days(31))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotAuthenticated));
    }

    #[tokio::test]
    async fn session_expires_exactly_at_expires_at() {
        let (manager, _) = manager();
        let (token, session) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        let err = manager
            .validate_session_token_at(&token, session.expires_at)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionExpired));
    }

    #[tokio::test]
    async fn sliding_refresh_keeps_active_user_signed_in() {
        let (manager, _) = manager();
        let (token, _) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        // 每 20 天访问一次，始终落在刷新窗口内
        for step in 1..=5 {
            let now = t0() + Duration::days(20 * step);
            let validated = manager.validate_session_token_at(&token, now).await.unwrap();
            assert_eq!(validated.session.expires_at, now + Duration::days(30));
        }
    }

    #[tokio::test]
    async fn unknown_or_malformed_tokens_are_rejected() {
        let (manager, _) = manager();

        for token in ["", "garbage", &"0".repeat(40)] {
            let err = manager.validate_session_token_at(token, t0()).await.unwrap_err();
            assert!(matches!(err, SessionError::NotAuthenticated));
        }
    }

    #[tokio::test]
    async fn invalidate_session_deletes_record() {
        let (manager, _) = manager();
        let (token, session) = manager.create_session_at(Uuid::new_v4(), t0()).await.unwrap();

        manager.invalidate_session(&session.session_id).await.unwrap();
        let err = manager.validate_session_token_at(&token, t0()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotAuthenticated));

        // 重复注销不报错
        manager.invalidate_session(&session.session_id).await.unwrap();
    }

    #[tokio::test]
    async fn invalidate_user_sessions_only_touches_that_user() {
        let (manager, store) = manager();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        manager.create_session_at(alice, t0()).await.unwrap();
        manager.create_session_at(alice, t0()).await.unwrap();
        let (bob_token, _) = manager.create_session_at(bob, t0()).await.unwrap();

        assert_eq!(manager.invalidate_user_sessions(alice).await.unwrap(), 2);
        assert_eq!(store.len().await, 1);
        assert!(manager.validate_session_token_at(&bob_token, t0()).await.is_ok());
    }
}
