// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Params, Scrypt,
};
use thiserror::Error;

/// Default scrypt cost (`log2(N)`)
pub const DEFAULT_PASSWORD_COST: u8 = 15;

/// Accepted range for the configurable cost
pub const PASSWORD_COST_RANGE: std::ops::RangeInclusive<u8> = 1..=20;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("invalid scrypt cost {0}")]
    InvalidCost(u8),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
    #[error("password worker failed: {0}")]
    Worker(String),
}

/// Salted scrypt hashing with a configurable cost
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// `cost` is scrypt's `log2(N)`; `r = 8`, `p = 1`
    pub fn new(cost: u8) -> Result<Self, PasswordError> {
        if !PASSWORD_COST_RANGE.contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }
        let params = Params::new(cost, 8, 1, Params::RECOMMENDED_LEN)
            .map_err(|_| PasswordError::InvalidCost(cost))?;
        Ok(Self { params })
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Compare a password against a stored hash.
    ///
    /// `Ok(false)` is a mismatch; `Err` means the stored hash itself is unusable.
    pub fn verify(&self, hash: &str, plain: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::MalformedHash)?;
        match Scrypt.verify_password(plain.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(scrypt::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(PasswordError::MalformedHash),
        }
    }

    /// [`PasswordHasher::hash`] on the blocking pool
    pub async fn hash_blocking(&self, plain: String) -> Result<String, PasswordError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| PasswordError::Worker(e.to_string()))?
    }

    /// [`PasswordHasher::verify`] on the blocking pool
    pub async fn verify_blocking(&self, hash: String, plain: String) -> Result<bool, PasswordError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &plain))
            .await
            .map_err(|e| PasswordError::Worker(e.to_string()))?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::new(DEFAULT_PASSWORD_COST, 8, 1, Params::RECOMMENDED_LEN)
                .unwrap_or_default(),
        }
    }
}
