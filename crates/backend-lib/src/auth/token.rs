// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
/** Signed access tokens.
Tokens are HS256 JWTs carrying the identity id, email, role, issue time and
expiry. Verification is pure: it checks structure, signature and expiry and
never consults the credential store. */
use chrono::{DateTime, Duration, Utc};
use habits_common::{IdentityId, Role};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::storage::Identity;

/// Default token lifetime in seconds (24 hours)
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing secret is empty")]
    MissingSecret,
    #[error("token encoding failed: {0}")]
    Encode(String),
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Signed payload of an access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: IdentityId,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies access tokens with one shared secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        // Expiry is checked against the caller's clock in `verify`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Claims for `identity` issued at `now`
    pub fn claims_for(&self, identity: &Identity, now: DateTime<Utc>) -> Claims {
        Claims {
            id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        }
    }

    /// Issue a token for `identity`, valid for the codec's ttl from `now`
    pub fn issue(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, TokenError> {
        self.sign(&self.claims_for(identity, now))
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Check structure, signature and expiry. Fails once `now > exp`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        if now.timestamp() > data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}
