use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_busy_timeout_seconds: u64,
    pub session_ttl_hours: u64,
    pub leaderboard_window_hours: u64,
    pub leaderboard_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        Ok(Self {
            http_addr,
            database_url: env_or("DATABASE_URL", "sqlite://kudos.db"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "10")?,
            db_busy_timeout_seconds: env_or_parse("DB_BUSY_TIMEOUT_SECONDS", "5")?,
            session_ttl_hours: env_or_parse("SESSION_TTL_HOURS", "720")?,
            leaderboard_window_hours: env_or_parse("LEADERBOARD_WINDOW_HOURS", "24")?,
            leaderboard_limit: env_or_parse("LEADERBOARD_LIMIT", "5")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
