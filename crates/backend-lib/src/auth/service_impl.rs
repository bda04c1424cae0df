use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use habits_common::{IdentityId, RegisterRequest, Role, UpdateUserRequest};
use metrics::counter;
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::auth::{
    AttemptOutcome, AttemptPermit, AuthService, Clock, LockoutPolicy, LoginRejection,
    LoginSuccess, PasswordHasher, TokenCodec,
};
use crate::error::AppError;
use crate::metrics::{
    IDENTITY_LOCKED, IDENTITY_REGISTERED, IDENTITY_UNLOCKED, LOGIN_FAILED, LOGIN_SUCCEEDED,
};
use crate::storage::{CredentialStore, Identity, NewIdentity};
use crate::validation::{validate_register, validate_update};

/// Plaintext behind the hash that rejected logins verify against
const TIMING_PASSWORD: &str = "habits-timing-equalizer";

/// Exclusive hold on one identity; the map entry goes away with the last holder
struct IdentityGuard<'a> {
    locks: &'a DashMap<IdentityId, Arc<Mutex<()>>>,
    id: IdentityId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone, so a count of one means nobody else wants it.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Auth service over a credential store.
///
/// Every read-modify-write of an identity runs under that identity's async
/// lock and ends in exactly one store write.
pub struct DefaultAuth<S> {
    store: Arc<S>,
    hasher: PasswordHasher,
    codec: Arc<TokenCodec>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    locks: DashMap<IdentityId, Arc<Mutex<()>>>,
    timing_hash: OnceCell<String>,
}

impl<S: CredentialStore> DefaultAuth<S> {
    pub fn new(
        store: Arc<S>,
        hasher: PasswordHasher,
        codec: Arc<TokenCodec>,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hasher,
            codec,
            policy,
            clock,
            locks: DashMap::new(),
            timing_hash: OnceCell::new(),
        }
    }

    async fn lock_identity(&self, id: IdentityId) -> IdentityGuard<'_> {
        let lock = self.locks.entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        IdentityGuard {
            locks: &self.locks,
            id,
            guard: Some(guard),
        }
    }

    /// One verification against a fixed hash, so every rejected login costs
    /// the same as a wrong password
    async fn spend_verification(&self, password: &str) -> Result<(), AppError> {
        let hash = self
            .timing_hash
            .get_or_try_init(|| self.hasher.hash_blocking(TIMING_PASSWORD.to_string()))
            .await?;
        self.hasher
            .verify_blocking(hash.clone(), password.to_string())
            .await?;
        Ok(())
    }

    /// Re-read under the identity lock so decisions see the latest record
    async fn fresh(&self, id: IdentityId) -> Result<Identity, AppError> {
        self.store
            .get(id, "")
            .await?
            .ok_or_else(|| AppError::NotFound(format!("identity {id}")))
    }
}

#[async_trait]
impl<S: CredentialStore + 'static> AuthService for DefaultAuth<S> {
    #[instrument(skip_all, fields(email = %req.email))]
    async fn register(&self, req: RegisterRequest) -> Result<Identity, AppError> {
        validate_register(&req)?;

        if self.store.get(0, &req.email).await?.is_some() {
            return Err(AppError::EmailTaken);
        }

        let password_hash = self.hasher.hash_blocking(req.password).await?;
        let identity = self
            .store
            .create(NewIdentity {
                email: req.email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                role: Role::User,
            })
            .await?;

        counter!(IDENTITY_REGISTERED).increment(1);
        info!(id = identity.id, "Identity registered");
        Ok(identity)
    }

    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<LoginSuccess, AppError> {
        let Some(found) = self.store.get(0, email).await? else {
            self.spend_verification(password).await?;
            counter!(LOGIN_FAILED).increment(1);
            debug!("Login for unknown email");
            return Err(AppError::CredentialMismatch);
        };

        let _guard = self.lock_identity(found.id).await;

        let mut identity = match self.store.get(found.id, "").await? {
            Some(identity) => identity,
            None => {
                self.spend_verification(password).await?;
                return Err(AppError::CredentialMismatch);
            },
        };
        let now = self.clock.now();

        match self.policy.admit(&mut identity, now) {
            Ok(AttemptPermit::Active) => {},
            Ok(AttemptPermit::Unlocked) => {
                counter!(IDENTITY_UNLOCKED).increment(1);
                info!(id = identity.id, "Lock window elapsed, identity unlocked");
            },
            Err(LoginRejection::Inactive) => {
                self.spend_verification(password).await?;
                counter!(LOGIN_FAILED).increment(1);
                return Err(AppError::UserInactive);
            },
            Err(LoginRejection::Locked) => {
                self.spend_verification(password).await?;
                counter!(LOGIN_FAILED).increment(1);
                return Err(AppError::UserLocked);
            },
        }

        let matched = self
            .hasher
            .verify_blocking(identity.password_hash.clone(), password.to_string())
            .await?;

        let outcome = self.policy.apply(&mut identity, matched, now);
        identity.updated_at = now;
        self.store.update(&identity).await?;

        match outcome {
            AttemptOutcome::Succeeded => {
                let access_token = self.codec.issue(&identity, now)?;
                counter!(LOGIN_SUCCEEDED).increment(1);
                info!(id = identity.id, "Login succeeded");
                Ok(LoginSuccess {
                    identity,
                    access_token,
                })
            },
            AttemptOutcome::Failed { locked } => {
                counter!(LOGIN_FAILED).increment(1);
                if locked {
                    counter!(IDENTITY_LOCKED).increment(1);
                    warn!(
                        id = identity.id,
                        failed_attempts = identity.failed_attempts,
                        "Identity locked after repeated failures"
                    );
                }
                Err(AppError::CredentialMismatch)
            },
        }
    }

    #[instrument(skip(self, req))]
    async fn update(&self, id: IdentityId, req: UpdateUserRequest) -> Result<Identity, AppError> {
        validate_update(&req)?;

        let _guard = self.lock_identity(id).await;
        let mut identity = self.fresh(id).await?;

        let old_password = req.old_password.unwrap_or_default();
        let matched = self
            .hasher
            .verify_blocking(identity.password_hash.clone(), old_password)
            .await?;
        if !matched {
            return Err(AppError::CredentialMismatch);
        }

        if let Some(email) = req.email {
            if let Some(other) = self.store.get(0, &email).await? {
                if other.id != identity.id {
                    return Err(AppError::EmailTaken);
                }
            }
            identity.email = email;
        }
        if req.first_name.is_some() {
            identity.first_name = req.first_name;
        }
        if req.last_name.is_some() {
            identity.last_name = req.last_name;
        }
        if let Some(new_password) = req.new_password {
            identity.password_hash = self.hasher.hash_blocking(new_password).await?;
        }

        identity.updated_at = self.clock.now();
        self.store.update(&identity).await?;
        info!(id, "Identity updated");
        Ok(identity)
    }

    #[instrument(skip(self))]
    async fn unlock(&self, id: IdentityId) -> Result<Identity, AppError> {
        let _guard = self.lock_identity(id).await;
        let mut identity = self.fresh(id).await?;

        if identity.is_locked || identity.failed_attempts > 0 {
            self.policy.unlock(&mut identity);
            identity.updated_at = self.clock.now();
            self.store.update(&identity).await?;
            counter!(IDENTITY_UNLOCKED).increment(1);
            info!(id, "Identity unlocked by administrator");
        }
        Ok(identity)
    }
}
