use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use backend::{
    AppState,
    config::{Config, SessionBackend},
    middleware::{RateLimiter, rate_limit},
    router::create_router,
    session::{
        MemorySessionStore, PgSessionStore, RedisSessionStore, SessionManager, SessionStoreKind,
    },
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'forum_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let redis = Arc::new(
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client"),
    );

    let store = match config.session_backend {
        SessionBackend::Postgres => SessionStoreKind::Postgres(PgSessionStore::new(pool.clone())),
        SessionBackend::Redis => SessionStoreKind::Redis(RedisSessionStore::new(redis.clone())),
        SessionBackend::Memory => {
            tracing::warn!("Using in-memory session store, sessions are lost on restart");
            SessionStoreKind::Memory(MemorySessionStore::new())
        }
    };
    tracing::info!(backend = ?config.session_backend, "Session store ready");

    let sessions = SessionManager::new(
        store,
        config.session_max_duration(),
        config.session_refresh_window(),
    )
    .expect("Invalid session durations");

    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis.clone(),
        sessions,
    };

    let rate_limiter = Arc::new(RateLimiter::new(redis, &config));

    let router = create_router(state).layer(axum::middleware::from_fn_with_state(
        rate_limiter,
        rate_limit,
    ));

    // 开发环境允许跨域
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
