use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use serde::{Deserialize, Serialize};

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// 统一响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 错误码，0 表示成功
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const USER_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// 用户名：3 到 24 个字母、数字或下划线
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < 3 || username.len() > 24 {
        return Err("用户名长度必须在3到24个字符之间".into());
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("用户名只允许使用字母、数字和下划线".into());
    }
    Ok(())
}

// bcrypt 只处理前 72 字节
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 6 || password.len() > 72 {
        return Err("密码长度必须在6到72个字节之间".into());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
        {
            Ok(())
        }
        _ => Err("邮箱格式无效".into()),
    }
}
