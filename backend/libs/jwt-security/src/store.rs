//! TTL key-value store seam used by the revocation ledger

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

/// Durable key-value store where every entry carries its own expiry
///
/// Expired entries must be invisible to every read. Implementations are shared
/// across request workers and must tolerate unbounded concurrent use.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Write `key`, replacing any existing value and expiry
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Write `key` only when no live entry exists. Returns true if it was written.
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns true if a live entry was removed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Write every entry in one round trip
    async fn set_many_with_ttl(
        &self,
        entries: &[(String, String, Duration)],
    ) -> Result<(), StoreError>;
}

/// Expiry in whole milliseconds, never below 1 so a positive TTL is never
/// written as "no expiry"
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
