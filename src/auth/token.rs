use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AdminIdentity;

pub const SESSION_TTL_HOURS: i64 = 2;

/// Shared secret and lifetime used to sign admin session tokens.
#[derive(Clone)]
pub struct TokenSettings {
    secret: Vec<u8>,
    ttl: Duration,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: Uuid,
}

/// A freshly signed token together with the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid session token: {0}")]
    Invalid(String),
    #[error("session token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl TokenSettings {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn issue(
        &self,
        identity: &AdminIdentity,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let issued_at = now.timestamp();
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: identity.username.clone(),
            iat: issued_at,
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            expires_at,
        })
    }

    /// Checks the signature, then that `now` is strictly before the expiry.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AdminIdentity, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock with zero leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|err| TokenError::Invalid(err.to_string()))?;

        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or_else(|| TokenError::Invalid("expiry out of range".to_string()))?;

        if now >= expires_at {
            return Err(TokenError::Expired(expires_at));
        }

        Ok(AdminIdentity::new(data.claims.sub))
    }
}
