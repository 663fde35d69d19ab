//! In-memory `UserStore` for tests and `USER_STORE_BACKEND=memory`

use super::{UserStore, UserStoreError};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self.users.get(username).map(|u| u.value().clone()))
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(UserStoreError::UsernameTaken),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = User {
                    username: user.username,
                    nickname: user.nickname,
                    password_hash: user.password_hash,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn update_nickname(&self, username: &str, nickname: &str) -> Result<(), UserStoreError> {
        let mut user = self
            .users
            .get_mut(username)
            .ok_or(UserStoreError::NotFound)?;
        user.nickname = nickname.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_username(
        &self,
        current: &str,
        new_username: &str,
    ) -> Result<(), UserStoreError> {
        if current == new_username {
            return if self.users.contains_key(current) {
                Ok(())
            } else {
                Err(UserStoreError::NotFound)
            };
        }

        let (_, mut user) = self
            .users
            .remove(current)
            .ok_or(UserStoreError::NotFound)?;

        // The entry guard holds a shard lock; it must be released before the
        // account is put back under its old name.
        let outcome = match self.users.entry(new_username.to_string()) {
            Entry::Occupied(_) => Err(user),
            Entry::Vacant(slot) => {
                user.username = new_username.to_string();
                user.updated_at = Utc::now();
                slot.insert(user);
                Ok(())
            }
        };

        outcome.map_err(|user| {
            self.users.insert(current.to_string(), user);
            UserStoreError::UsernameTaken
        })
    }

    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), UserStoreError> {
        let mut user = self
            .users
            .get_mut(username)
            .ok_or(UserStoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }
}
