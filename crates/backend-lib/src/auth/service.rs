use async_trait::async_trait;
use habits_common::{IdentityId, RegisterRequest, UpdateUserRequest};

use crate::error::AppError;
use crate::storage::Identity;

/// A login that passed every guard
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub identity: Identity,
    pub access_token: String,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an active `user` identity from a validated body
    async fn register(&self, req: RegisterRequest) -> Result<Identity, AppError>;

    /// One login attempt, driving the lockout state machine
    async fn login(&self, email: &str, password: &str) -> Result<LoginSuccess, AppError>;

    /// Profile and password change, authorized by the old password
    async fn update(&self, id: IdentityId, req: UpdateUserRequest) -> Result<Identity, AppError>;

    /// Clear a lock regardless of the lock window
    async fn unlock(&self, id: IdentityId) -> Result<Identity, AppError>;
}
