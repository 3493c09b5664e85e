use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::session::SessionError;
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("邮箱或密码错误")]
    InvalidCredentials,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("密码处理失败: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Session(e) => return session_error_response(e),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::Conflict(_) => (StatusCode::CONFLICT, error_codes::USER_EXISTS),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::Database(_) | AppError::Password(_) => {
                tracing::error!(error = %self, "Request failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response::<()>(
                        error_codes::INTERNAL_ERROR,
                        "内部服务器错误".to_string(),
                    ),
                )
                    .into_response();
            }
        };

        (status, error_to_api_response::<()>(code, self.to_string())).into_response()
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        session_error_response(&self)
    }
}

// 未登录与过期返回 401，由客户端跳转登录页；存储故障返回 500，不重试
fn session_error_response(e: &SessionError) -> Response {
    match e {
        SessionError::NotAuthenticated | SessionError::SessionExpired => (
            StatusCode::UNAUTHORIZED,
            error_to_api_response::<()>(error_codes::AUTH_FAILED, e.to_string()),
        )
            .into_response(),
        SessionError::StoreUnavailable(_) | SessionError::ExpiryOutOfRange => {
            tracing::error!(error = %e, "Session error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>(
                    error_codes::INTERNAL_ERROR,
                    "内部服务器错误".to_string(),
                ),
            )
                .into_response()
        }
    }
}
