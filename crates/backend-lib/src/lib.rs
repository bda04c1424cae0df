// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the habits API server: bearer-token
//! authentication, account lockout, admission control and per-request
//! activity recording.

pub mod activity;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use anyhow::Context;

use crate::activity::ActivityRecorder;
use crate::auth::{
    AuthService, Clock, DefaultAuth, LockoutPolicy, PasswordHasher, SystemClock, TokenCodec,
};
use crate::config::Settings;
use crate::middleware::AdmissionLimiter;
use crate::storage::CredentialStore;

pub use router::create_router;

/// Application state shared across all handlers
pub struct AppState<S> {
    /// Registration, login and account changes
    pub auth: Arc<dyn AuthService>,
    /// Credential store backend
    pub store: Arc<S>,
    /// Access token codec
    pub codec: Arc<TokenCodec>,
    /// Process-wide admission limiter
    pub limiter: Arc<AdmissionLimiter>,
    /// Activity hook
    pub recorder: Arc<dyn ActivityRecorder>,
    /// The single source of "now"
    pub clock: Arc<dyn Clock>,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
}

impl<S: CredentialStore + 'static> AppState<S> {
    /// Create a new application state on the system clock
    pub fn new(
        store: S,
        settings: Settings,
        recorder: Arc<dyn ActivityRecorder>,
    ) -> anyhow::Result<Self> {
        Self::with_clock(store, settings, recorder, Arc::new(SystemClock))
    }

    /// Create a new application state on an explicit clock
    pub fn with_clock(
        store: S,
        settings: Settings,
        recorder: Arc<dyn ActivityRecorder>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let limiter = AdmissionLimiter::new(
            settings.rate_limit.requests_per_second,
            settings.rate_limit.burst,
        );
        Self::with_limiter(store, settings, recorder, clock, Arc::new(limiter))
    }

    /// Create a new application state from explicit parts
    pub fn with_limiter(
        store: S,
        settings: Settings,
        recorder: Arc<dyn ActivityRecorder>,
        clock: Arc<dyn Clock>,
        limiter: Arc<AdmissionLimiter>,
    ) -> anyhow::Result<Self> {
        settings.validate()?;

        let store = Arc::new(store);
        let codec = Arc::new(
            TokenCodec::new(settings.auth.jwt_secret.as_bytes(), settings.auth.token_ttl())
                .context("failed to build token codec")?,
        );
        let hasher = PasswordHasher::new(settings.auth.password_cost)
            .context("failed to build password hasher")?;
        let policy = LockoutPolicy::new(settings.auth.lock_threshold, settings.auth.lock_window());
        let auth = Arc::new(DefaultAuth::new(
            store.clone(),
            hasher,
            codec.clone(),
            policy,
            clock.clone(),
        ));

        Ok(Self {
            auth,
            store,
            codec,
            limiter,
            recorder,
            clock,
            settings: Arc::new(settings),
        })
    }
}
