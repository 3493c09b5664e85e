/// 会话相关错误
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 没有令牌、令牌格式错误或会话不存在
    #[error("未登录")]
    NotAuthenticated,

    /// 会话存在但已过期（记录已被删除）
    #[error("会话已过期")]
    SessionExpired,

    /// 会话时长配置超出可表示的时间范围
    #[error("会话有效期超出范围")]
    ExpiryOutOfRange,

    #[error("会话存储不可用: {0}")]
    StoreUnavailable(String),
}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<redis::RedisError> for SessionError {
    fn from(e: redis::RedisError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        Self::StoreUnavailable(format!("会话序列化错误: {}", e))
    }
}
