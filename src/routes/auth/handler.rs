use axum::{
    extract::{Extension, Json, State},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

use super::model::{LoginRequest, LogoutAllResponse, LogoutResponse, SessionResponse, SignupRequest};
use crate::{
    AppState,
    error::AppError,
    middleware::CurrentUser,
    routes::user::User,
    session::{
        SessionError,
        cookie::{clear_session_cookie, session_cookie, session_token},
        token::{is_well_formed, session_id_from_token},
    },
    utils::{ApiResponse, success_to_api_response, validate_email, validate_password, validate_username},
};

/// 为用户创建会话并写入 cookie
async fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
) -> Result<(CookieJar, Json<ApiResponse<SessionResponse>>), AppError> {
    let (token, session) = state.sessions.create_session(user.user_id).await?;
    let jar = jar.add(session_cookie(
        &token,
        session.expires_at,
        state.config.production,
    ));

    Ok((
        jar,
        success_to_api_response(SessionResponse {
            user,
            expires_at: session.expires_at,
        }),
    ))
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();
    let username = req.username.trim();

    validate_email(&email).map_err(AppError::Validation)?;
    validate_username(username).map_err(AppError::Validation)?;
    validate_password(&req.password).map_err(AppError::Validation)?;

    let user = User::create(&state.pool, &email, username, &req.password).await?;
    start_session(&state, jar, user).await
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();

    let Some(user) = User::find_by_email(&state.pool, &email).await? else {
        return Err(AppError::InvalidCredentials);
    };
    if !user.verify_login(&req.password)? {
        tracing::info!(user_id = %user.user_id, "Rejected login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    start_session(&state, jar, user).await
}

/// 注销当前会话，无论 cookie 是否有效都清除 cookie
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = session_token(&jar).filter(|t| is_well_formed(t)) {
        state
            .sessions
            .invalidate_session(&session_id_from_token(&token))
            .await?;
    }

    let jar = jar.add(clear_session_cookie(state.config.production));
    Ok((jar, success_to_api_response(LogoutResponse {})))
}

/// 返回当前会话对应的用户
#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    // 用户已被删除时会话随之失效
    let Some(user) = User::find_by_id(&state.pool, current.user_id).await? else {
        state.sessions.invalidate_session(&current.session_id).await?;
        return Err(SessionError::NotAuthenticated.into());
    };

    Ok(success_to_api_response(SessionResponse {
        user,
        expires_at: current.expires_at,
    }))
}

/// 注销当前用户在所有设备上的会话
#[axum::debug_handler]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state
        .sessions
        .invalidate_user_sessions(current.user_id)
        .await?;

    let jar = jar.add(clear_session_cookie(state.config.production));
    Ok((jar, success_to_api_response(LogoutAllResponse { revoked })))
}
