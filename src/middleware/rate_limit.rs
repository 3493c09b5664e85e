use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// 基于 Redis 计数器的按 IP 限流
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    window_secs: u64,
    max_requests: u32,
}

/// 客户端 IP：优先 x-real-ip，其次 x-forwarded-for 第一个非空项，最后是连接地址
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let remote_ip = remote.map(|addr| addr.ip().to_string());

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: &Config) -> Self {
        Self {
            redis,
            window_secs: config.rate_limit_window_secs,
            max_requests: config.rate_limit_requests,
        }
    }

    /// 计一次请求，返回是否仍在限额内
    pub async fn hit(&self, ip: &str) -> Result<bool, redis::RedisError> {
        let key = format!("rate_limit:{}", ip);
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let count: u64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, self.window_secs as i64).await?;
        }

        Ok(count <= u64::from(self.max_requests))
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let ip = client_ip(req.headers(), remote);

    match limiter.hit(&ip).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::warn!(ip = %ip, "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                error_to_api_response::<()>(
                    error_codes::RATE_LIMIT,
                    format!("请求过于频繁，请在{}秒后重试", limiter.window_secs),
                ),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Rate limiter unavailable");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
