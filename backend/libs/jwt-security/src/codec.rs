//! Session token codec
//!
//! Issues and verifies compact HS256 tokens. Only HS256 is accepted on the way
//! in, so a token declaring any other algorithm (`none`, RS256, HS512, ...) is
//! rejected before its payload is looked at.
//!
//! Temporal checks run against the codec's [`Clock`](crate::clock::Clock)
//! after the signature has been verified.

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::claims::Claims;
use crate::clock::{system_clock, SharedClock};
use crate::config::JwtSettings;
use crate::error::TokenError;

/// Signing algorithm, fixed for every token this codec produces or accepts
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    lifetime: Duration,
    leeway_secs: i64,
    clock: SharedClock,
}

impl TokenCodec {
    pub fn new(settings: &JwtSettings) -> Self {
        Self::with_clock(settings, system_clock())
    }

    pub fn with_clock(settings: &JwtSettings, clock: SharedClock) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // exp / iat / nbf are checked against our own clock in `check_window`
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding: EncodingKey::from_secret(settings.secret()),
            decoding: DecodingKey::from_secret(settings.secret()),
            validation,
            issuer: settings.issuer.clone(),
            lifetime: Duration::seconds(settings.token_ttl_secs),
            leeway_secs: settings.leeway_secs,
            clock,
        }
    }

    /// Issue a token for `subject`, valid from now for the configured lifetime
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::EmptySubject);
        }

        let now = self.clock.now();
        let claims = Claims {
            username: subject.to_string(),
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            nbf: None,
            jti: Uuid::new_v4().to_string(),
        };

        self.sign(&claims)
    }

    /// Sign an explicit claims record with the process secret
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(TOKEN_ALGORITHM), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, issuer, claim shape and validity window
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Empty);
        }

        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;

        if claims.username.is_empty() || claims.sub != claims.username {
            return Err(TokenError::Malformed);
        }

        self.check_window(&claims)?;
        Ok(claims)
    }

    fn check_window(&self, claims: &Claims) -> Result<(), TokenError> {
        let now = self.clock.now().timestamp();

        if now >= claims.exp.saturating_add(self.leeway_secs) {
            return Err(TokenError::Expired);
        }

        let earliest = claims.nbf.map_or(claims.iat, |nbf| nbf.max(claims.iat));
        if now.saturating_add(self.leeway_secs) < earliest {
            return Err(TokenError::NotYetValid);
        }

        Ok(())
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}
