use chrono::{DateTime, Utc};
use serde::Serialize;

/// User account row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub username: String,
    pub nickname: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub nickname: String,
    pub password_hash: String,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub nickname: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            nickname: user.nickname.clone(),
        }
    }
}
