use std::sync::Arc;

use axum::{
    Extension, Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
    routing::get,
};
use backend::{
    AppState,
    config::Config,
    middleware::{CurrentUser, auth_middleware},
    router::create_router,
    session::{MemorySessionStore, SessionManager, SessionStore, SessionStoreKind},
};
use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

// 连接池是惰性的，这里覆盖的路径都不会访问数据库
fn test_state() -> (AppState, MemorySessionStore) {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://postgres@localhost/forum_test".into()),
        "REDIS_URL" => Some("redis://127.0.0.1/".into()),
        _ => None,
    })
    .unwrap();

    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .unwrap();
    let redis = Arc::new(redis::Client::open(config.redis_url.clone()).unwrap());

    let store = MemorySessionStore::new();
    let sessions = SessionManager::new(
        SessionStoreKind::Memory(store.clone()),
        config.session_max_duration(),
        config.session_refresh_window(),
    )
    .unwrap();

    let state = AppState {
        pool,
        config,
        redis,
        sessions,
    };
    (state, store)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session={}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}

async fn whoami(Extension(current): Extension<CurrentUser>) -> String {
    current.user_id.to_string()
}

fn guarded_router(state: AppState) -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}

#[tokio::test]
async fn session_check_without_cookie_is_unauthorized() {
    let (state, _) = test_state();
    let app = create_router(state);

    let response = app
        .oneshot(request("GET", "/api/auth/session", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], 1002);
}

#[tokio::test]
async fn malformed_cookie_is_rejected_and_cleared() {
    let (state, _) = test_state();
    let app = create_router(state);

    let response = app
        .oneshot(request("GET", "/api/auth/session", Some("not-a-token"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookie = set_cookie(&response).expect("stale cookie should be cleared");
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn expired_session_is_rejected_and_deleted() {
    let (state, store) = test_state();
    let (token, session) = state
        .sessions
        .create_session_at(Uuid::new_v4(), Utc::now() - Duration::days(31))
        .await
        .unwrap();
    let app = guarded_router(state);

    let response = app
        .oneshot(request("GET", "/whoami", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(store.find(&session.session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn guard_injects_user_without_touching_fresh_cookie() {
    let (state, _) = test_state();
    let user_id = Uuid::new_v4();
    let (token, _) = state.sessions.create_session(user_id).await.unwrap();
    let app = guarded_router(state);

    let response = app
        .oneshot(request("GET", "/whoami", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_none());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, user_id.to_string().as_bytes());
}

#[tokio::test]
async fn guard_reissues_cookie_when_session_is_refreshed() {
    let (state, store) = test_state();
    let user_id = Uuid::new_v4();
    let (token, session) = state
        .sessions
        .create_session_at(user_id, Utc::now() - Duration::days(20))
        .await
        .unwrap();
    let app = guarded_router(state);

    let response = app
        .oneshot(request("GET", "/whoami", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).expect("refreshed session should re-issue cookie");
    assert!(cookie.starts_with(&format!("session={}", token)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));

    let stored = store.find(&session.session_id).await.unwrap().unwrap();
    assert!(stored.expires_at > session.expires_at);
}

#[tokio::test]
async fn logout_deletes_session_and_clears_cookie() {
    let (state, store) = test_state();
    let (token, _) = state.sessions.create_session(Uuid::new_v4()).await.unwrap();
    let app = create_router(state);

    let response = app
        .oneshot(request("POST", "/api/auth/logout", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn logout_without_session_still_succeeds() {
    let (state, _) = test_state();
    let app = create_router(state);

    let response = app
        .oneshot(request("POST", "/api/auth/logout", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["code"], 0);
}

#[tokio::test]
async fn logout_all_revokes_every_session_of_the_user() {
    let (state, store) = test_state();
    let user_id = Uuid::new_v4();
    let (token, _) = state.sessions.create_session(user_id).await.unwrap();
    state.sessions.create_session(user_id).await.unwrap();
    state.sessions.create_session(Uuid::new_v4()).await.unwrap();
    let app = create_router(state);

    let response = app
        .oneshot(request("DELETE", "/api/auth/sessions", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["resp_data"]["revoked"], 2);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn logout_all_inside_refresh_window_leaves_only_the_clearing_cookie() {
    let (state, store) = test_state();
    let (token, _) = state
        .sessions
        .create_session_at(Uuid::new_v4(), Utc::now() - Duration::days(20))
        .await
        .unwrap();
    let app = create_router(state);

    let response = app
        .oneshot(request("DELETE", "/api/auth/sessions", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 1, "unexpected cookies: {:?}", cookies);
    assert!(cookies[0].starts_with("session=;"));
    assert!(cookies[0].contains("Max-Age=0"));
    assert!(!cookies[0].contains(&token));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn username_is_validated_before_update() {
    let (state, _) = test_state();
    let (token, _) = state.sessions.create_session(Uuid::new_v4()).await.unwrap();
    let app = create_router(state);

    let response = app
        .oneshot(request(
            "PUT",
            "/api/users/username",
            Some(&token),
            Some(serde_json::json!({ "username": "x" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 1000);
}

#[tokio::test]
async fn signup_rejects_invalid_email_before_touching_database() {
    let (state, store) = test_state();
    let app = create_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/api/auth/signup",
            None,
            Some(serde_json::json!({
                "email": "no-at-sign",
                "username": "valid_name",
                "password": "secret123"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.is_empty().await);
}
