use anyhow::{bail, Context, Result};
use db_pool::DbConfig;
use jwt_security::{validate_secret_strength, JwtSettings, SecretStrength};
use redis_utils::RedisSettings;
use serde::Deserialize;
use std::time::Duration;

pub const SERVICE_NAME: &str = "user-service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_env")]
    pub env: String,

    #[serde(default = "default_app_host")]
    pub host: String,

    #[serde(default = "default_app_port")]
    pub port: u16,
}

/// Backend selection and store timeouts, read without a prefix
#[derive(Debug, Deserialize)]
struct BackendEnv {
    #[serde(default)]
    revocation_backend: RevocationBackend,

    #[serde(default)]
    user_store_backend: UserStoreBackend,

    #[serde(default = "default_redis_op_timeout_ms")]
    redis_op_timeout_ms: u64,

    #[serde(default = "default_run_migrations")]
    run_migrations: bool,
}

#[derive(Clone)]
pub struct Config {
    pub app: AppConfig,
    pub revocation_backend: RevocationBackend,
    pub user_store_backend: UserStoreBackend,
    pub redis: RedisSettings,
    pub redis_op_timeout: Duration,
    /// Present only when users live in PostgreSQL
    pub database: Option<DbConfig>,
    pub run_migrations: bool,
    pub jwt: JwtSettings,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app", &self.app)
            .field("revocation_backend", &self.revocation_backend)
            .field("user_store_backend", &self.user_store_backend)
            .field("redis", &self.redis)
            .field("redis_op_timeout", &self.redis_op_timeout)
            .field("database", &self.database)
            .field("run_migrations", &self.run_migrations)
            .field("jwt_issuer", &self.jwt.issuer)
            .finish()
    }
}

// Default value functions
fn default_app_env() -> String {
    "development".to_string()
}

fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_app_port() -> u16 {
    8080
}

fn default_redis_op_timeout_ms() -> u64 {
    3000
}

fn default_run_migrations() -> bool {
    true
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut app: AppConfig = envy::prefixed("APP_")
            .from_env()
            .context("invalid APP_* settings")?;
        if std::env::var("APP_PORT").is_err() {
            if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
                app.port = port;
            }
        }

        let backends: BackendEnv = envy::from_env().context("invalid backend settings")?;

        let database = match backends.user_store_backend {
            UserStoreBackend::Postgres => Some(
                DbConfig::from_env(SERVICE_NAME)
                    .map_err(anyhow::Error::msg)
                    .context("DATABASE_URL is required when USER_STORE_BACKEND=postgres")?,
            ),
            UserStoreBackend::Memory => None,
        };

        let redis = RedisSettings::from_env()?;
        let jwt = JwtSettings::from_env().context("invalid JWT_* settings")?;

        Ok(Config {
            app,
            revocation_backend: backends.revocation_backend,
            user_store_backend: backends.user_store_backend,
            redis,
            redis_op_timeout: Duration::from_millis(backends.redis_op_timeout_ms),
            database,
            run_migrations: backends.run_migrations,
            jwt,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }

    /// Refuse a weak signing secret in production, warn about it elsewhere
    pub fn check_secret_strength(&self) -> Result<SecretStrength> {
        let strength = validate_secret_strength(self.jwt.secret());
        if strength.is_weak() {
            if self.is_production() {
                bail!("JWT_SECRET is too weak for production; use at least 32 random bytes");
            }
            tracing::warn!(env = %self.app.env, "JWT_SECRET is weak; do not use it in production");
        }
        Ok(strength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const STRONG_SECRET: &str = "q8Zr3vN1xL0pWk7TfY2bHs9MdJc4GeRu6AoViEyQnXt5KlPwCzBgUjSh";

    fn clear_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "PORT",
            "REVOCATION_BACKEND",
            "USER_STORE_BACKEND",
            "REDIS_OP_TIMEOUT_MS",
            "RUN_MIGRATIONS",
            "DATABASE_URL",
            "JWT_SECRET",
            "JWT_ISSUER",
            "JWT_TOKEN_TTL_SECS",
            "JWT_LEEWAY_SECS",
            "JWT_REVOCATION_KEY_MODE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_memory_backends_need_no_database() {
        clear_env();
        std::env::set_var("USER_STORE_BACKEND", "memory");
        std::env::set_var("REVOCATION_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", STRONG_SECRET);

        let config = Config::from_env().unwrap();
        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.user_store_backend, UserStoreBackend::Memory);
        assert_eq!(config.revocation_backend, RevocationBackend::Memory);
        assert!(config.database.is_none());
        assert_eq!(config.redis_op_timeout, Duration::from_millis(3000));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_postgres_backend_requires_database_url() {
        clear_env();
        std::env::set_var("JWT_SECRET", STRONG_SECRET);

        assert!(Config::from_env().is_err());

        std::env::set_var("DATABASE_URL", "postgres://localhost/users");
        let config = Config::from_env().unwrap();
        assert!(config.database.is_some());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_port_falls_back_to_port_var() {
        clear_env();
        std::env::set_var("USER_STORE_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", STRONG_SECRET);
        std::env::set_var("PORT", "9090");

        assert_eq!(Config::from_env().unwrap().app.port, 9090);

        std::env::set_var("APP_PORT", "7070");
        assert_eq!(Config::from_env().unwrap().app.port, 7070);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_secret_is_rejected() {
        clear_env();
        std::env::set_var("USER_STORE_BACKEND", "memory");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_weak_secret_refused_only_in_production() {
        clear_env();
        std::env::set_var("USER_STORE_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", "secret");

        let mut config = Config::from_env().unwrap();
        assert_eq!(
            config.check_secret_strength().unwrap(),
            SecretStrength::Weak
        );

        config.app.env = "production".into();
        assert!(config.check_secret_strength().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_debug_hides_secret() {
        clear_env();
        std::env::set_var("USER_STORE_BACKEND", "memory");
        std::env::set_var("JWT_SECRET", STRONG_SECRET);

        let config = Config::from_env().unwrap();
        assert!(!format!("{:?}", config).contains(STRONG_SECRET));

        clear_env();
    }
}
