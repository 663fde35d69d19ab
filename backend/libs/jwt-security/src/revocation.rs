//! Revocation ledger (token blacklist)
//!
//! Records "this token is revoked until its natural expiry" in a [`TtlStore`].
//! Entries carry a TTL equal to the token's remaining lifetime, so the store
//! drops them on its own once the token would fail verification anyway.
//!
//! **Key format**: `blacklist:token:<raw-token>`, or
//! `blacklist:token:sha256:<hex digest>` in [`RevocationKeyMode::Sha256`].

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::SharedClock;
use crate::config::RevocationKeyMode;
use crate::error::RevocationError;
use crate::store::TtlStore;

pub const REVOCATION_KEY_PREFIX: &str = "blacklist:token:";
const REVOKED_MARKER: &str = "1";

/// Outcome of a single revocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    Recorded,
    /// A live entry already existed; nothing was written
    AlreadyRevoked,
}

/// Outcome of a batch revocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchRevocation {
    pub recorded: usize,
    /// Empty tokens and tokens already past their expiry
    pub skipped: usize,
}

pub struct RevocationLedger {
    store: Arc<dyn TtlStore>,
    clock: SharedClock,
    key_mode: RevocationKeyMode,
}

impl RevocationLedger {
    pub fn new(store: Arc<dyn TtlStore>, clock: SharedClock, key_mode: RevocationKeyMode) -> Self {
        Self {
            store,
            clock,
            key_mode,
        }
    }

    pub fn key_mode(&self) -> RevocationKeyMode {
        self.key_mode
    }

    /// Store key for `token`
    pub fn key_for(&self, token: &str) -> String {
        match self.key_mode {
            RevocationKeyMode::Raw => format!("{}{}", REVOCATION_KEY_PREFIX, token),
            RevocationKeyMode::Sha256 => {
                format!("{}sha256:{}", REVOCATION_KEY_PREFIX, sha256_hex(token))
            }
        }
    }

    /// Remaining lifetime, or `None` if the token is already past `expires_at`
    fn remaining(&self, expires_at: DateTime<Utc>) -> Option<Duration> {
        let remaining = expires_at - self.clock.now();
        if remaining <= chrono::Duration::zero() {
            return None;
        }
        remaining.to_std().ok()
    }

    /// Revoke `token` until `expires_at`
    pub async fn revoke(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Revocation, RevocationError> {
        if token.is_empty() {
            return Err(RevocationError::EmptyToken);
        }
        let ttl = self
            .remaining(expires_at)
            .ok_or(RevocationError::AlreadyExpired)?;

        let written = self
            .store
            .set_if_absent_with_ttl(&self.key_for(token), REVOKED_MARKER, ttl)
            .await?;

        if written {
            info!(
                token = %token_fingerprint(token),
                ttl_ms = ttl.as_millis() as u64,
                "Token added to revocation ledger"
            );
            Ok(Revocation::Recorded)
        } else {
            Ok(Revocation::AlreadyRevoked)
        }
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        if token.is_empty() {
            return Err(RevocationError::EmptyToken);
        }
        Ok(self.store.exists(&self.key_for(token)).await?)
    }

    /// Remove `token`'s entry ahead of its expiry. Returns true if one existed.
    pub async fn remove(&self, token: &str) -> Result<bool, RevocationError> {
        if token.is_empty() {
            return Err(RevocationError::EmptyToken);
        }

        let removed = self.store.delete(&self.key_for(token)).await?;
        if removed {
            info!(token = %token_fingerprint(token), "Token removed from revocation ledger");
        }
        Ok(removed)
    }

    /// Revoke many tokens in one pipelined write
    ///
    /// Empty tokens and tokens already past their expiry are skipped rather
    /// than failing the batch.
    pub async fn batch_revoke(
        &self,
        tokens: &HashMap<String, DateTime<Utc>>,
    ) -> Result<BatchRevocation, RevocationError> {
        let mut summary = BatchRevocation::default();
        let mut entries = Vec::with_capacity(tokens.len());

        for (token, expires_at) in tokens {
            match self.remaining(*expires_at) {
                Some(ttl) if !token.is_empty() => {
                    entries.push((self.key_for(token), REVOKED_MARKER.to_string(), ttl));
                }
                _ => summary.skipped += 1,
            }
        }

        if entries.is_empty() {
            return Ok(summary);
        }

        let attempted = entries.len();
        self.store
            .set_many_with_ttl(&entries)
            .await
            .map_err(|source| {
                warn!(attempted, error = %source, "Batch revocation failed");
                RevocationError::PartialFailure { attempted, source }
            })?;

        summary.recorded = attempted;
        info!(
            recorded = summary.recorded,
            skipped = summary.skipped,
            "Batch revocation complete"
        );
        Ok(summary)
    }

    /// Number of live entries in the ledger namespace
    pub async fn count(&self) -> Result<usize, RevocationError> {
        Ok(self
            .store
            .keys_with_prefix(REVOCATION_KEY_PREFIX)
            .await?
            .len())
    }

    /// Remove every entry in the ledger namespace (admin operation)
    pub async fn purge_all(&self) -> Result<usize, RevocationError> {
        let keys = self.store.keys_with_prefix(REVOCATION_KEY_PREFIX).await?;

        let mut removed = 0;
        for key in &keys {
            if self.store.delete(key).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(count = removed, "Cleared revocation ledger");
        }
        Ok(removed)
    }
}

fn sha256_hex(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Short, non-reversible token identifier for logs
pub fn token_fingerprint(token: &str) -> String {
    let mut digest = sha256_hex(token);
    digest.truncate(12);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::error::StoreError;
    use crate::memory_store::MemoryTtlStore;
    use crate::test_utils::FailingStore;

    fn ledger(mode: RevocationKeyMode) -> (RevocationLedger, Arc<MemoryTtlStore>, ManualClock) {
        let clock = ManualClock::starting_now();
        let store = Arc::new(MemoryTtlStore::with_clock(Arc::new(clock.clone())));
        let ledger = RevocationLedger::new(store.clone(), Arc::new(clock.clone()), mode);
        (ledger, store, clock)
    }

    #[test]
    fn test_key_format() {
        let (raw, _, _) = ledger(RevocationKeyMode::Raw);
        assert_eq!(raw.key_for("abc.def.ghi"), "blacklist:token:abc.def.ghi");

        let (hashed, _, _) = ledger(RevocationKeyMode::Sha256);
        let key = hashed.key_for("abc.def.ghi");
        assert!(key.starts_with("blacklist:token:sha256:"));
        assert!(!key.contains("abc.def.ghi"));
        assert_eq!(key.len(), "blacklist:token:sha256:".len() + 64);
    }

    #[tokio::test]
    async fn test_revoke_until_expiry() {
        let (ledger, _, clock) = ledger(RevocationKeyMode::Raw);
        let expires_at = clock.now() + chrono::Duration::minutes(5);

        assert_eq!(
            ledger.revoke("tok", expires_at).await.unwrap(),
            Revocation::Recorded
        );
        assert!(ledger.is_revoked("tok").await.unwrap());

        clock.advance(chrono::Duration::minutes(5));
        assert!(!ledger.is_revoked("tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_twice_is_noop() {
        let (ledger, _, clock) = ledger(RevocationKeyMode::Raw);
        let expires_at = clock.now() + chrono::Duration::minutes(5);

        ledger.revoke("tok", expires_at).await.unwrap();
        assert_eq!(
            ledger.revoke("tok", expires_at).await.unwrap(),
            Revocation::AlreadyRevoked
        );
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revoke_rejects_expired_and_empty() {
        let (ledger, store, clock) = ledger(RevocationKeyMode::Raw);

        assert!(matches!(
            ledger.revoke("tok", clock.now()).await,
            Err(RevocationError::AlreadyExpired)
        ));
        assert!(matches!(
            ledger
                .revoke("tok", clock.now() - chrono::Duration::seconds(1))
                .await,
            Err(RevocationError::AlreadyExpired)
        ));
        assert!(matches!(
            ledger.revoke("", clock.now() + chrono::Duration::minutes(1)).await,
            Err(RevocationError::EmptyToken)
        ));
        assert!(matches!(
            ledger.is_revoked("").await,
            Err(RevocationError::EmptyToken)
        ));
        assert_eq!(store.raw_len(), 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let (ledger, _, clock) = ledger(RevocationKeyMode::Sha256);
        ledger
            .revoke("tok", clock.now() + chrono::Duration::minutes(1))
            .await
            .unwrap();

        assert!(ledger.remove("tok").await.unwrap());
        assert!(!ledger.is_revoked("tok").await.unwrap());
        assert!(!ledger.remove("tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_revoke_skips_expired() {
        let (ledger, _, clock) = ledger(RevocationKeyMode::Raw);
        let now = clock.now();
        let tokens: HashMap<String, DateTime<Utc>> = [
            ("live-1".to_string(), now + chrono::Duration::minutes(1)),
            ("live-2".to_string(), now + chrono::Duration::hours(1)),
            ("dead".to_string(), now - chrono::Duration::seconds(1)),
            (String::new(), now + chrono::Duration::minutes(1)),
        ]
        .into_iter()
        .collect();

        let summary = ledger.batch_revoke(&tokens).await.unwrap();
        assert_eq!(
            summary,
            BatchRevocation {
                recorded: 2,
                skipped: 2
            }
        );
        assert!(ledger.is_revoked("live-1").await.unwrap());
        assert!(!ledger.is_revoked("dead").await.unwrap());

        clock.advance(chrono::Duration::minutes(2));
        assert!(!ledger.is_revoked("live-1").await.unwrap());
        assert!(ledger.is_revoked("live-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_count_and_purge_all() {
        let (ledger, store, clock) = ledger(RevocationKeyMode::Raw);
        let expires_at = clock.now() + chrono::Duration::minutes(1);
        for token in ["a", "b", "c"] {
            ledger.revoke(token, expires_at).await.unwrap();
        }
        store
            .set_with_ttl("other:key", "1", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(ledger.count().await.unwrap(), 3);
        assert_eq!(ledger.purge_all().await.unwrap(), 3);
        assert_eq!(ledger.count().await.unwrap(), 0);
        assert!(store.exists("other:key").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_unavailable() {
        let clock = ManualClock::starting_now();
        let ledger = RevocationLedger::new(
            Arc::new(FailingStore::timeout()),
            Arc::new(clock.clone()),
            RevocationKeyMode::Raw,
        );
        let expires_at = clock.now() + chrono::Duration::minutes(1);

        assert!(matches!(
            ledger.is_revoked("tok").await,
            Err(RevocationError::StoreUnavailable(StoreError::Timeout(_)))
        ));
        assert!(matches!(
            ledger.revoke("tok", expires_at).await,
            Err(RevocationError::StoreUnavailable(_))
        ));

        let tokens = HashMap::from([("tok".to_string(), expires_at)]);
        assert!(matches!(
            ledger.batch_revoke(&tokens).await,
            Err(RevocationError::PartialFailure { attempted: 1, .. })
        ));
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let fp = token_fingerprint("abc.def.ghi");
        assert_eq!(fp.len(), 12);
        assert_eq!(fp, token_fingerprint("abc.def.ghi"));
        assert_ne!(fp, token_fingerprint("abc.def.ghj"));
    }
}
