//! Session authenticator
//!
//! Composes the revocation ledger and the token codec into the single
//! accept-or-reject decision made for every authenticated request. The ledger
//! is consulted first, so a revoked token is rejected no matter how valid its
//! signature is, and a ledger that cannot be read rejects instead of being
//! treated as "not revoked".

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::claims::Claims;
use crate::codec::TokenCodec;
use crate::error::{AuthError, InvalidationError, RevocationError, TokenError};
use crate::revocation::{token_fingerprint, Revocation, RevocationLedger};

/// Verify-or-reject seam used by the request gate
#[async_trait]
pub trait TokenAuthenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Claims, AuthError>;
}

pub struct SessionAuthenticator {
    codec: Arc<TokenCodec>,
    ledger: Arc<RevocationLedger>,
}

impl SessionAuthenticator {
    pub fn new(codec: Arc<TokenCodec>, ledger: Arc<RevocationLedger>) -> Self {
        Self { codec, ledger }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn ledger(&self) -> &RevocationLedger {
        &self.ledger
    }

    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.codec.issue(subject)
    }

    /// Revoke a token until its own expiry (logout, credential change)
    ///
    /// The token is verified first, so only tokens this process issued and
    /// that are still within their validity window reach the ledger.
    pub async fn invalidate(&self, token: &str) -> Result<Revocation, InvalidationError> {
        let claims = self.codec.verify(token)?;
        let outcome = self.ledger.revoke(token, claims.expires_at()).await?;

        info!(
            username = %claims.username,
            token = %token_fingerprint(token),
            ?outcome,
            "Session invalidated"
        );
        Ok(outcome)
    }

    async fn check(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(TokenError::Empty.into());
        }

        match self.ledger.is_revoked(token).await {
            Ok(true) => return Err(AuthError::Revoked),
            Ok(false) => {}
            Err(RevocationError::EmptyToken) => return Err(TokenError::Empty.into()),
            Err(RevocationError::StoreUnavailable(e))
            | Err(RevocationError::PartialFailure { source: e, .. }) => {
                return Err(AuthError::StoreUnavailable(e));
            }
            Err(RevocationError::AlreadyExpired) => {}
        }

        Ok(self.codec.verify(token)?)
    }
}

#[async_trait]
impl TokenAuthenticator for SessionAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        let result = self.check(token).await;

        if let Err(err) = &result {
            let fingerprint = token_fingerprint(token);
            if err.is_infrastructure() {
                warn!(token = %fingerprint, error = %err, "Cannot confirm token is not revoked");
            } else {
                debug!(token = %fingerprint, kind = err.kind().as_str(), "Token rejected");
            }
        }

        result
    }
}
