use config::Config;
use redis::Client as RedisClient;
use session::SessionManager;
use sqlx::PgPool;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod session;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub sessions: SessionManager,
}
