use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes,
};

/// 组装 API 路由，限流与 CORS 由调用方叠加
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout));

    let protected_routes = Router::new()
        .route("/auth/session", get(routes::auth::get_session))
        .route("/auth/sessions", delete(routes::auth::logout_all))
        .route("/users/username", put(routes::user::update_username))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    // axum 不允许在根路径 nest
    let base = state.config.api_base_uri.trim_matches('/').to_string();
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{}", base), api)
    };

    router
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
