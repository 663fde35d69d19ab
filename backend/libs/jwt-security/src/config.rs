//! Token settings, loaded once at startup and passed to the codec and ledger

use serde::Deserialize;
use std::fmt;
use zeroize::Zeroizing;

pub const DEFAULT_ISSUER: &str = "user-backend";
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_LEEWAY_SECS: i64 = 0;

/// How revocation entries are keyed in the TTL store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationKeyMode {
    /// `blacklist:token:<raw-token>`
    #[default]
    Raw,
    /// `blacklist:token:sha256:<hex digest>`
    Sha256,
}

/// Raw `JWT_*` environment values
#[derive(Deserialize)]
struct JwtEnv {
    secret: String,
    #[serde(default = "default_issuer")]
    issuer: String,
    #[serde(default = "default_token_ttl_secs")]
    token_ttl_secs: i64,
    #[serde(default = "default_leeway_secs")]
    leeway_secs: i64,
    #[serde(default)]
    revocation_key_mode: RevocationKeyMode,
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

fn default_token_ttl_secs() -> i64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_leeway_secs() -> i64 {
    DEFAULT_LEEWAY_SECS
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read JWT settings from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("JWT secret must not be empty")]
    EmptySecret,

    #[error("token lifetime must be positive, got {0}s")]
    NonPositiveLifetime(i64),

    #[error("leeway must not be negative, got {0}s")]
    NegativeLeeway(i64),
}

/// Signing and validation settings
#[derive(Clone)]
pub struct JwtSettings {
    secret: Zeroizing<Vec<u8>>,
    pub issuer: String,
    pub token_ttl_secs: i64,
    pub leeway_secs: i64,
    pub revocation_key_mode: RevocationKeyMode,
}

impl JwtSettings {
    /// Settings with defaults for everything but the secret
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SettingsError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SettingsError::EmptySecret);
        }

        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            issuer: default_issuer(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            leeway_secs: DEFAULT_LEEWAY_SECS,
            revocation_key_mode: RevocationKeyMode::default(),
        })
    }

    /// Load from `JWT_SECRET`, `JWT_ISSUER`, `JWT_TOKEN_TTL_SECS`,
    /// `JWT_LEEWAY_SECS` and `JWT_REVOCATION_KEY_MODE`
    pub fn from_env() -> Result<Self, SettingsError> {
        let env: JwtEnv = envy::prefixed("JWT_").from_env()?;

        Self::new(env.secret.as_bytes())?
            .with_issuer(env.issuer)
            .with_token_ttl_secs(env.token_ttl_secs)?
            .with_leeway_secs(env.leeway_secs)
            .map(|s| s.with_revocation_key_mode(env.revocation_key_mode))
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_token_ttl_secs(mut self, ttl: i64) -> Result<Self, SettingsError> {
        if ttl <= 0 {
            return Err(SettingsError::NonPositiveLifetime(ttl));
        }
        self.token_ttl_secs = ttl;
        Ok(self)
    }

    pub fn with_leeway_secs(mut self, leeway: i64) -> Result<Self, SettingsError> {
        if leeway < 0 {
            return Err(SettingsError::NegativeLeeway(leeway));
        }
        self.leeway_secs = leeway;
        Ok(self)
    }

    pub fn with_revocation_key_mode(mut self, mode: RevocationKeyMode) -> Self {
        self.revocation_key_mode = mode;
        self
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("revocation_key_mode", &self.revocation_key_mode)
            .finish()
    }
}
