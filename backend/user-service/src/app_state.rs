//! Application state shared by every worker
//!
//! Built once from [`Config`]: the user store and the session authenticator
//! (codec + revocation ledger) live behind `Arc`s and are cloned per worker.

use anyhow::{Context, Result};
use jwt_security::{
    system_clock, MemoryTtlStore, RedisTtlStore, RevocationLedger, SessionAuthenticator,
    TokenAuthenticator, TokenCodec, TtlStore,
};
use redis_utils::RedisPool;
use std::sync::Arc;

use crate::config::{Config, RevocationBackend, UserStoreBackend};
use crate::db::{run_migrations, MemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<SessionAuthenticator>,
}

impl AppState {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<SessionAuthenticator>) -> Self {
        Self { users, sessions }
    }

    /// The authenticator handed to the request gate
    pub fn authenticator(&self) -> Arc<dyn TokenAuthenticator> {
        self.sessions.clone()
    }

    /// Connect the configured backends
    pub async fn from_config(config: &Config) -> Result<Self> {
        let users = build_user_store(config).await?;
        let revocations = build_revocation_store(config).await?;

        let codec = Arc::new(TokenCodec::new(&config.jwt));
        let ledger = Arc::new(RevocationLedger::new(
            revocations,
            system_clock(),
            config.jwt.revocation_key_mode,
        ));

        Ok(Self::new(
            users,
            Arc::new(SessionAuthenticator::new(codec, ledger)),
        ))
    }
}

async fn build_user_store(config: &Config) -> Result<Arc<dyn UserStore>> {
    match config.user_store_backend {
        UserStoreBackend::Memory => {
            tracing::warn!("Using in-memory user store; accounts are lost on restart");
            Ok(Arc::new(MemoryUserStore::new()))
        }
        UserStoreBackend::Postgres => {
            let db_config = config
                .database
                .clone()
                .context("database settings missing for postgres user store")?;
            db_config.log_config();
            let query_timeout = db_config.query_timeout();

            let pool = db_pool::create_pool(db_config)
                .await
                .context("failed to create database pool")?;

            if config.run_migrations {
                tracing::info!("Running database migrations...");
                run_migrations(&pool)
                    .await
                    .context("database migrations failed")?;
            } else {
                tracing::info!("Skipping database migrations (RUN_MIGRATIONS=false)");
            }

            Ok(Arc::new(PgUserStore::new(pool, query_timeout)))
        }
    }
}

async fn build_revocation_store(config: &Config) -> Result<Arc<dyn TtlStore>> {
    match config.revocation_backend {
        RevocationBackend::Memory => {
            tracing::warn!("Using in-memory revocation store; logouts are lost on restart");
            Ok(Arc::new(MemoryTtlStore::new()))
        }
        RevocationBackend::Redis => {
            let pool = RedisPool::connect(&config.redis)
                .await
                .context("failed to connect revocation store")?;
            Ok(Arc::new(RedisTtlStore::new(
                pool.manager(),
                config.redis_op_timeout,
            )))
        }
    }
}
