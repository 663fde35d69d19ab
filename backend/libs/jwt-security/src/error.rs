//! Error taxonomy for token issuance, verification and revocation
//!
//! Codec and ledger failures stay distinguishable here so they can be logged
//! and counted by kind. The request gate collapses them into a uniform 401
//! using [`AuthError::public_reason`].

use std::time::Duration;
use thiserror::Error;

/// Token codec failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token string is empty")]
    Empty,

    #[error("subject cannot be empty")]
    EmptySubject,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not active yet")]
    NotYetValid,

    #[error("couldn't handle this token")]
    Unhandled,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            _ => TokenError::Unhandled,
        }
    }
}

/// TTL store failures; both variants mean "the store could not be consulted"
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Revocation ledger failures
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("token cannot be empty")]
    EmptyToken,

    #[error("token is already expired")]
    AlreadyExpired,

    #[error("revocation store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("batch revocation of {attempted} entries failed: {source}")]
    PartialFailure {
        attempted: usize,
        #[source]
        source: StoreError,
    },
}

/// Session authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("token has been revoked")]
    Revoked,

    #[error("cannot confirm token is not revoked: {0}")]
    StoreUnavailable(StoreError),
}

/// Failures of an explicit invalidation (logout, credential change)
#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Revocation(#[from] RevocationError),
}

/// Flat classification of an authentication failure, used for logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailureKind {
    EmptyInput,
    Malformed,
    InvalidSignature,
    Expired,
    NotYetValid,
    Revoked,
    StoreUnavailable,
    Unknown,
}

impl AuthFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailureKind::EmptyInput => "empty_input",
            AuthFailureKind::Malformed => "malformed",
            AuthFailureKind::InvalidSignature => "invalid_signature",
            AuthFailureKind::Expired => "expired",
            AuthFailureKind::NotYetValid => "not_yet_valid",
            AuthFailureKind::Revoked => "revoked",
            AuthFailureKind::StoreUnavailable => "store_unavailable",
            AuthFailureKind::Unknown => "unknown",
        }
    }

    /// Reason shown to the caller. Revocation reads exactly like a bad token.
    pub fn public_reason(&self) -> &'static str {
        match self {
            AuthFailureKind::Expired => "Token has expired",
            AuthFailureKind::Malformed
            | AuthFailureKind::InvalidSignature
            | AuthFailureKind::Revoked => "Invalid token",
            AuthFailureKind::NotYetValid => "Token not active yet",
            AuthFailureKind::EmptyInput
            | AuthFailureKind::StoreUnavailable
            | AuthFailureKind::Unknown => "Authentication failed",
        }
    }
}

impl TokenError {
    pub fn kind(&self) -> AuthFailureKind {
        match self {
            TokenError::Empty | TokenError::EmptySubject => AuthFailureKind::EmptyInput,
            TokenError::Malformed => AuthFailureKind::Malformed,
            TokenError::InvalidSignature => AuthFailureKind::InvalidSignature,
            TokenError::Expired => AuthFailureKind::Expired,
            TokenError::NotYetValid => AuthFailureKind::NotYetValid,
            TokenError::Unhandled | TokenError::Signing(_) => AuthFailureKind::Unknown,
        }
    }
}

impl AuthError {
    pub fn kind(&self) -> AuthFailureKind {
        match self {
            AuthError::Token(e) => e.kind(),
            AuthError::Revoked => AuthFailureKind::Revoked,
            AuthError::StoreUnavailable(_) => AuthFailureKind::StoreUnavailable,
        }
    }

    /// True when the failure came from infrastructure rather than the token itself
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable(_))
    }

    pub fn public_reason(&self) -> &'static str {
        self.kind().public_reason()
    }
}
