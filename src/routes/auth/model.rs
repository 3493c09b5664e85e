use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::routes::user::User;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}
