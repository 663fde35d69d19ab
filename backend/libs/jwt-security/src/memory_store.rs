//! In-process TTL store for tests and local development

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;

use crate::clock::{system_clock, SharedClock};
use crate::error::StoreError;
use crate::store::{ttl_millis, TtlStore};

struct StoredValue {
    value: String,
    expires_at: DateTime<Utc>,
}

/// [`TtlStore`] backed by a `DashMap`
///
/// Expiry is evaluated against the injected clock on every read; expired
/// entries are evicted lazily when touched.
pub struct MemoryTtlStore {
    entries: DashMap<String, StoredValue>,
    clock: SharedClock,
}

impl MemoryTtlStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        let millis = i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX);
        self.clock.now() + chrono::Duration::milliseconds(millis)
    }

    fn is_live(&self, stored: &StoredValue) -> bool {
        stored.expires_at > self.clock.now()
    }

    /// Live value for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|stored| self.is_live(stored))
            .map(|stored| stored.value.clone())
    }

    /// Number of entries held, including expired ones not yet evicted
    pub fn raw_len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for MemoryTtlStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: self.expiry(ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let fresh = StoredValue {
            value: value.to_string(),
            expires_at: self.expiry(ttl),
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if self.is_live(occupied.get()) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let live = match self.entries.get(key) {
            Some(stored) => self.is_live(&stored),
            None => return Ok(false),
        };

        if !live {
            self.entries.remove_if(key, |_, stored| !self.is_live(stored));
        }
        Ok(live)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .remove(key)
            .map(|(_, stored)| self.is_live(&stored))
            .unwrap_or(false))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.entries.retain(|_, stored| self.is_live(stored));

        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn set_many_with_ttl(
        &self,
        entries: &[(String, String, Duration)],
    ) -> Result<(), StoreError> {
        for (key, value, ttl) in entries {
            self.set_with_ttl(key, value, *ttl).await?;
        }
        Ok(())
    }
}
