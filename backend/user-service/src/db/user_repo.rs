//! User repository - PostgreSQL implementation of `UserStore`

use super::{UserStore, UserStoreError};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgQueryResult;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

const UNIQUE_VIOLATION: &str = "23505";

/// Apply the embedded migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgUserStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }
}

/// Run one store call under `limit`, including the wait for a connection
async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, UserStoreError>
where
    F: Future<Output = Result<T, UserStoreError>>,
{
    match timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                timeout_ms = limit.as_millis() as u64,
                "Database query timed out"
            );
            Err(UserStoreError::Timeout(limit))
        }
    }
}

fn map_write_error(err: sqlx::Error) -> UserStoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            UserStoreError::UsernameTaken
        }
        _ => UserStoreError::Database(err),
    }
}

fn require_row(result: PgQueryResult) -> Result<(), UserStoreError> {
    if result.rows_affected() == 0 {
        Err(UserStoreError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT username, nickname, password_hash, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool);

        bounded(self.query_timeout, async { query.await.map_err(UserStoreError::from) }).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        let now = Utc::now();

        let query = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, nickname, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING username, nickname, password_hash, created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.nickname)
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool);

        bounded(self.query_timeout, async { query.await.map_err(map_write_error) }).await
    }

    async fn update_nickname(&self, username: &str, nickname: &str) -> Result<(), UserStoreError> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET nickname = $1, updated_at = $2
            WHERE username = $3
            "#,
        )
        .bind(nickname)
        .bind(Utc::now())
        .bind(username)
        .execute(&self.pool);

        bounded(self.query_timeout, async {
            query.await.map_err(UserStoreError::from).and_then(require_row)
        })
        .await
    }

    async fn update_username(
        &self,
        current: &str,
        new_username: &str,
    ) -> Result<(), UserStoreError> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET username = $1, updated_at = $2
            WHERE username = $3
            "#,
        )
        .bind(new_username)
        .bind(Utc::now())
        .bind(current)
        .execute(&self.pool);

        bounded(self.query_timeout, async {
            query.await.map_err(map_write_error).and_then(require_row)
        })
        .await
    }

    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), UserStoreError> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = $2
            WHERE username = $3
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(username)
        .execute(&self.pool);

        bounded(self.query_timeout, async {
            query.await.map_err(UserStoreError::from).and_then(require_row)
        })
        .await
    }
}
