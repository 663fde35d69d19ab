//! Test utilities for token and revocation testing
//!
//! Builds a full codec + ledger + authenticator stack over an in-memory store
//! and a manual clock, and provides safe Redis connections for the tests that
//! need a real server.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::authenticator::SessionAuthenticator;
use crate::clock::ManualClock;
use crate::codec::TokenCodec;
use crate::config::{JwtSettings, RevocationKeyMode};
use crate::error::StoreError;
use crate::memory_store::MemoryTtlStore;
use crate::revocation::RevocationLedger;
use crate::store::TtlStore;

pub const TEST_SECRET: &str = "test-secret-for-session-tokens-0123456789";

/// Settings with defaults and a fixed test secret
pub fn test_settings() -> JwtSettings {
    JwtSettings::new(TEST_SECRET).expect("test secret is non-empty")
}

/// Codec, ledger and authenticator sharing one manual clock
pub struct TestStack {
    pub clock: ManualClock,
    pub store: Arc<dyn TtlStore>,
    pub codec: Arc<TokenCodec>,
    pub ledger: Arc<RevocationLedger>,
    pub authenticator: Arc<SessionAuthenticator>,
}

impl TestStack {
    pub fn new() -> Self {
        let clock = ManualClock::starting_now();
        let store = Arc::new(MemoryTtlStore::with_clock(Arc::new(clock.clone())));
        Self::build(clock, store, &test_settings())
    }

    pub fn with_store(store: Arc<dyn TtlStore>) -> Self {
        Self::build(ManualClock::starting_now(), store, &test_settings())
    }

    pub fn with_settings(settings: &JwtSettings) -> Self {
        let clock = ManualClock::starting_now();
        let store = Arc::new(MemoryTtlStore::with_clock(Arc::new(clock.clone())));
        Self::build(clock, store, settings)
    }

    fn build(clock: ManualClock, store: Arc<dyn TtlStore>, settings: &JwtSettings) -> Self {
        let codec = Arc::new(TokenCodec::with_clock(settings, Arc::new(clock.clone())));
        let ledger = Arc::new(RevocationLedger::new(
            store.clone(),
            Arc::new(clock.clone()),
            settings.revocation_key_mode,
        ));
        let authenticator = Arc::new(SessionAuthenticator::new(codec.clone(), ledger.clone()));

        Self {
            clock,
            store,
            codec,
            ledger,
            authenticator,
        }
    }
}

impl Default for TestStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Store whose every operation fails with the same error
pub struct FailingStore {
    error: StoreError,
}

impl FailingStore {
    pub fn timeout() -> Self {
        Self {
            error: StoreError::Timeout(Duration::from_millis(3000)),
        }
    }

    pub fn backend(message: &str) -> Self {
        Self {
            error: StoreError::Backend(message.to_string()),
        }
    }
}

#[async_trait]
impl TtlStore for FailingStore {
    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(self.error.clone())
    }

    async fn set_if_absent_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<bool, StoreError> {
        Err(self.error.clone())
    }

    async fn exists(&self, _: &str) -> Result<bool, StoreError> {
        Err(self.error.clone())
    }

    async fn delete(&self, _: &str) -> Result<bool, StoreError> {
        Err(self.error.clone())
    }

    async fn keys_with_prefix(&self, _: &str) -> Result<Vec<String>, StoreError> {
        Err(self.error.clone())
    }

    async fn set_many_with_ttl(&self, _: &[(String, String, Duration)]) -> Result<(), StoreError> {
        Err(self.error.clone())
    }
}

/// Change the first character of the signature segment
///
/// The first base64url character carries six full bits of the MAC, so the
/// decoded signature always differs from the untampered one.
pub fn tamper_signature(token: &str) -> String {
    let Some((signed, signature)) = token.rsplit_once('.') else {
        return format!("{}x", token);
    };

    let mut chars = signature.chars();
    let replacement = match chars.next() {
        Some('A') => 'B',
        _ => 'A',
    };
    format!("{}.{}{}", signed, replacement, chars.as_str())
}

/// Sha256-keyed settings for ledger tests
pub fn hashed_key_settings() -> JwtSettings {
    test_settings().with_revocation_key_mode(RevocationKeyMode::Sha256)
}

/// Get Redis connection for testing
///
/// Uses REDIS_TEST_URL environment variable or defaults to localhost.
/// Tests should skip themselves when this fails.
pub async fn get_test_redis_connection() -> anyhow::Result<ConnectionManager> {
    let redis_url =
        env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = Client::open(redis_url)
        .map_err(|e| anyhow::anyhow!("Failed to create Redis client: {}", e))?;

    let manager = tokio::time::timeout(Duration::from_secs(2), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Timed out connecting to Redis"))?
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;

    Ok(manager)
}
