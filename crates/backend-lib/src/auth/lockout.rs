// ============================
// crates/backend-lib/src/auth/lockout.rs
// ============================
//! Account lockout after repeated failed logins.
//!
//! Pure decision logic over an identity's failure history. Locks are cleared
//! lazily: only a later login attempt that arrives after the lock window has
//! passed unlocks the account, there is no background sweep.

use chrono::{DateTime, Duration, Utc};

use crate::storage::Identity;

/// Default number of consecutive failures before locking
pub const DEFAULT_LOCK_THRESHOLD: u32 = 5;

/// Default lock window in seconds (24 hours)
pub const DEFAULT_LOCK_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Coarse lockout state of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Active,
    Locked,
}

/// Why an attempt was refused before the password was looked at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRejection {
    /// Account deactivated; terminal, counters untouched
    Inactive,
    /// Locked and still inside the lock window; counters untouched
    Locked,
}

/// Permission to compare credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPermit {
    /// The identity was already active
    Active,
    /// An expired lock was just cleared; the attempt proceeds as a fresh one
    Unlocked,
}

/// Result of applying a credential comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed { locked: bool },
}

/// Threshold and window for the lockout state machine
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    threshold: u32,
    window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_LOCK_THRESHOLD,
            Duration::seconds(DEFAULT_LOCK_WINDOW_SECS),
        )
    }
}

impl LockoutPolicy {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self { threshold, window }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self, identity: &Identity) -> LockState {
        if identity.is_locked {
            LockState::Locked
        } else {
            LockState::Active
        }
    }

    /// Whether a lock on `identity` may be cleared at `now`.
    ///
    /// A lock without a recorded failure time has no window to wait out.
    pub fn unlock_eligible(&self, identity: &Identity, now: DateTime<Utc>) -> bool {
        match identity.last_failed_login_at {
            Some(last) => now - last >= self.window,
            None => true,
        }
    }

    /// Guard phase of a login attempt.
    ///
    /// Order: inactive first, then lock state. When an expired lock is
    /// cleared the identity is mutated in place and the caller must persist
    /// it together with the outcome of the attempt.
    pub fn admit(
        &self,
        identity: &mut Identity,
        now: DateTime<Utc>,
    ) -> Result<AttemptPermit, LoginRejection> {
        if !identity.is_active {
            return Err(LoginRejection::Inactive);
        }

        match self.state(identity) {
            LockState::Active => Ok(AttemptPermit::Active),
            LockState::Locked if self.unlock_eligible(identity, now) => {
                self.unlock(identity);
                Ok(AttemptPermit::Unlocked)
            },
            LockState::Locked => Err(LoginRejection::Locked),
        }
    }

    /// Apply the credential comparison to an admitted identity
    pub fn apply(
        &self,
        identity: &mut Identity,
        credentials_match: bool,
        now: DateTime<Utc>,
    ) -> AttemptOutcome {
        if credentials_match {
            identity.failed_attempts = 0;
            return AttemptOutcome::Succeeded;
        }

        identity.failed_attempts = identity.failed_attempts.saturating_add(1);
        identity.last_failed_login_at = Some(now);
        let locked = identity.failed_attempts >= self.threshold;
        if locked {
            identity.is_locked = true;
        }
        AttemptOutcome::Failed { locked }
    }

    /// Clear a lock and its failure count
    pub fn unlock(&self, identity: &mut Identity) {
        identity.is_locked = false;
        identity.failed_attempts = 0;
    }
}
