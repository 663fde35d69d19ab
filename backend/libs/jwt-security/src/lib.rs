//! Session token security library
//!
//! **Components**:
//! - [`TokenCodec`]: issues and verifies HS256 session tokens
//! - [`RevocationLedger`]: TTL-bounded token blacklist over a [`TtlStore`]
//! - [`SessionAuthenticator`]: ledger check, then codec verification
//! - [`RedisTtlStore`] / [`MemoryTtlStore`]: store backends
//! - Secret strength validation for the shared signing secret
//!
//! Settings are built once into a [`JwtSettings`] and passed to constructors;
//! nothing here keeps process-global state.

pub mod authenticator;
pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod memory_store;
pub mod redis_store;
pub mod revocation;
pub mod secret_validation;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use authenticator::{SessionAuthenticator, TokenAuthenticator};
pub use claims::Claims;
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use codec::TokenCodec;
pub use config::{JwtSettings, RevocationKeyMode, SettingsError};
pub use error::{
    AuthError, AuthFailureKind, InvalidationError, RevocationError, StoreError, TokenError,
};
pub use memory_store::MemoryTtlStore;
pub use redis_store::RedisTtlStore;
pub use revocation::{token_fingerprint, BatchRevocation, Revocation, RevocationLedger};
pub use secret_validation::{generate_secure_secret, validate_secret_strength, SecretStrength};
pub use store::TtlStore;
