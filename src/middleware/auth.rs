use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    AppState,
    session::{
        SessionError,
        cookie::{SESSION_COOKIE_NAME, clear_session_cookie, session_cookie, session_token},
    },
};

/// 当前请求的登录身份，由 `auth_middleware` 注入请求扩展
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{}=", SESSION_COOKIE_NAME);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// 校验会话 cookie，失败时直接返回 401，不调用后续 handler
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let secure = state.config.production;

    let Some(token) = session_token(&jar) else {
        return SessionError::NotAuthenticated.into_response();
    };

    let validated = match state.sessions.validate_session_token(&token).await {
        Ok(validated) => validated,
        Err(e @ (SessionError::NotAuthenticated | SessionError::SessionExpired)) => {
            // 清掉客户端残留的无效 cookie
            return (jar.add(clear_session_cookie(secure)), e).into_response();
        }
        Err(e) => return e.into_response(),
    };

    let session = validated.session;
    request.extensions_mut().insert(CurrentUser {
        user_id: session.user_id,
        session_id: session.session_id.clone(),
        expires_at: session.expires_at,
    });

    let response = next.run(request).await;

    // 有效期已延长时重新下发 cookie；handler 已写过会话 cookie（如登出）则以其为准
    if validated.refreshed && !sets_session_cookie(&response) {
        let jar = jar.add(session_cookie(&token, session.expires_at, secure));
        (jar, response).into_response()
    } else {
        response
    }
}
