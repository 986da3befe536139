use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend_url: String,
    pub backend_anon_key: String,
    pub public_url: String,
    pub avatar_bucket: String,
    pub realtime_poll: Duration,
    pub http_timeout: Duration,
    pub session_idle: time::Duration,
    /// Zero disables the query cache.
    pub query_cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            backend_url: "http://localhost:54321".to_owned(),
            backend_anon_key: String::new(),
            public_url: "http://localhost:8080".to_owned(),
            avatar_bucket: "avatars".to_owned(),
            realtime_poll: Duration::from_millis(1000),
            http_timeout: Duration::from_secs(30),
            session_idle: time::Duration::minutes(60),
            query_cache_ttl: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            port: try_load("PATHWAY_PORT", 8080),
            backend_url: required("BACKEND_URL")?,
            backend_anon_key: required("BACKEND_ANON_KEY")?,
            public_url: try_load("PUBLIC_URL", "http://localhost:8080".to_owned()),
            avatar_bucket: try_load("AVATAR_BUCKET", "avatars".to_owned()),
            realtime_poll: Duration::from_millis(try_load("REALTIME_POLL_MS", 1000)),
            http_timeout: Duration::from_secs(try_load("HTTP_TIMEOUT_SECS", 30)),
            session_idle: time::Duration::minutes(try_load("SESSION_IDLE_MINUTES", 60)),
            query_cache_ttl: Duration::from_secs(try_load("QUERY_CACHE_SECS", 30)),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    let value = env::var(key).with_context(|| format!("{key} must be set"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("{key} is empty"));
    }
    Ok(value)
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}
