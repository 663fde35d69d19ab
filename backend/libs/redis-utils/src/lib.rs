//! Redis connection bootstrap
//!
//! Opens a `ConnectionManager` with a bounded connect timeout and checks the
//! server with `PING` before handing it out. `ConnectionManager` reconnects on
//! its own and is cheap to clone, so callers keep a clone per store.

use anyhow::{anyhow, Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

const DEFAULT_REDIS_PORT: u16 = 6379;

/// Redis connection settings
#[derive(Clone)]
pub struct RedisSettings {
    /// Full `redis://` URL; takes precedence over `addr` / `password` / `db`
    pub url: Option<String>,
    /// `host:port`
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
    pub connect_timeout: Duration,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: None,
            addr: format!("localhost:{}", DEFAULT_REDIS_PORT),
            password: None,
            db: 0,
            connect_timeout: Duration::from_millis(5000),
        }
    }
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("addr", &self.addr)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("db", &self.db)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl RedisSettings {
    /// Read `REDIS_URL`, or `REDIS_ADDR` / `REDIS_PASSWORD` / `REDIS_DB`, plus
    /// `REDIS_CONNECT_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let db = match std::env::var("REDIS_DB") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("REDIS_DB must be an integer, got {:?}", raw))?,
            Err(_) => defaults.db,
        };

        let connect_timeout = std::env::var("REDIS_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.connect_timeout);

        Ok(Self {
            url: non_empty_var("REDIS_URL"),
            addr: non_empty_var("REDIS_ADDR").unwrap_or(defaults.addr),
            password: non_empty_var("REDIS_PASSWORD"),
            db,
            connect_timeout,
        })
    }

    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        if let Some(url) = &self.url {
            return url
                .as_str()
                .into_connection_info()
                .context("failed to parse REDIS_URL connection string");
        }

        let (host, port) = split_addr(&self.addr)?;
        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn split_addr(addr: &str) -> Result<(String, u16)> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse()
                .with_context(|| format!("invalid Redis port in {:?}", addr))?;
            Ok((host.to_string(), port))
        }
        Some(_) => Err(anyhow!("invalid Redis address {:?}", addr)),
        None if !addr.is_empty() => Ok((addr.to_string(), DEFAULT_REDIS_PORT)),
        None => Err(anyhow!("Redis address is empty")),
    }
}

/// Connected Redis handle
pub struct RedisPool {
    manager: ConnectionManager,
}

impl RedisPool {
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        let info = settings.connection_info()?;
        let label = info.addr.to_string();
        let client = Client::open(info).context("failed to construct Redis client")?;

        let mut manager = timeout(settings.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                anyhow!(
                    "timed out connecting to Redis after {}ms",
                    settings.connect_timeout.as_millis()
                )
            })?
            .context("failed to initialize Redis connection manager")?;

        timeout(
            settings.connect_timeout,
            redis::cmd("PING").query_async::<_, String>(&mut manager),
        )
        .await
        .map_err(|_| anyhow!("timed out waiting for Redis PING"))?
        .context("Redis PING failed")?;

        info!(addr = %label, "Redis connection established");
        Ok(Self { manager })
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}
