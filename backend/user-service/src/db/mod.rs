//! User persistence
//!
//! Handlers talk to a [`UserStore`]; production uses [`PgUserStore`], tests and
//! local runs use [`MemoryUserStore`].

pub mod memory;
pub mod user_repo;

use crate::models::{NewUser, User};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryUserStore;
pub use user_repo::{run_migrations, PgUserStore};

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("username already exists")]
    UsernameTaken,

    #[error("user not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database query timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError>;

    /// Fails with `UsernameTaken` if the username is in use
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError>;

    async fn update_nickname(&self, username: &str, nickname: &str) -> Result<(), UserStoreError>;

    /// Rename an account; fails with `UsernameTaken` if `new_username` is in use
    async fn update_username(
        &self,
        current: &str,
        new_username: &str,
    ) -> Result<(), UserStoreError>;

    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), UserStoreError>;
}
