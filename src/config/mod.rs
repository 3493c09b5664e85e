use std::env;
use std::time::Duration;

/// 会话存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Postgres,
    Redis,
    Memory,
}

impl SessionBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Some(Self::Postgres),
            "redis" => Some(Self::Redis),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("缺少环境变量 {0}")]
    Missing(&'static str),
    #[error("环境变量 {key} 的值无效: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub production: bool,
    pub session_backend: SessionBackend,
    pub session_max_duration_secs: u64,
    pub session_refresh_window_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
}

const DAY_SECS: u64 = 24 * 3600;
const MAX_SESSION_DAYS: u64 = 3650;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，`from_env` 以进程环境变量为来源
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        // 会话时长以天为单位，允许带 d 后缀，最长 MAX_SESSION_DAYS 天
        let days = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            let Some(raw) = lookup(key) else {
                return Ok(default * DAY_SECS);
            };
            match raw.trim().trim_end_matches('d').parse::<u64>() {
                Ok(d) if d <= MAX_SESSION_DAYS => Ok(d * DAY_SECS),
                _ => Err(ConfigError::Invalid { key, value: raw }),
            }
        };

        let session_backend = match lookup("SESSION_BACKEND") {
            None => SessionBackend::Postgres,
            Some(raw) => SessionBackend::parse(&raw).ok_or(ConfigError::Invalid {
                key: "SESSION_BACKEND",
                value: raw,
            })?,
        };

        let config = Config {
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            api_base_uri: lookup("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            production: lookup("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            session_backend,
            session_max_duration_secs: days("SESSION_MAX_DURATION", 30)?,
            session_refresh_window_secs: days("SESSION_REFRESH_WINDOW", 15)?,
            rate_limit_window_secs: lookup("RATE_LIMIT_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_requests: lookup("RATE_LIMIT_REQUESTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        };

        if config.session_refresh_window_secs >= config.session_max_duration_secs {
            return Err(ConfigError::Invalid {
                key: "SESSION_REFRESH_WINDOW",
                value: format!("{}d", config.session_refresh_window_secs / DAY_SECS),
            });
        }

        Ok(config)
    }

    pub fn session_max_duration(&self) -> Duration {
        Duration::from_secs(self.session_max_duration_secs)
    }

    pub fn session_refresh_window(&self) -> Duration {
        Duration::from_secs(self.session_refresh_window_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
