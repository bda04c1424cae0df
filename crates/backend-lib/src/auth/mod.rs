// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod clock;
pub mod lockout;
pub mod password;
pub mod principal;
mod service;
mod service_impl;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lockout::{AttemptOutcome, AttemptPermit, LockState, LockoutPolicy, LoginRejection};
pub use password::{PasswordError, PasswordHasher, DEFAULT_PASSWORD_COST};
pub use principal::{AuthenticatedPrincipal, KnownPrincipal, Principal, ResolvedPrincipalId};
pub use service::{AuthService, LoginSuccess};
pub use service_impl::DefaultAuth;
pub use token::{Claims, TokenCodec, TokenError, DEFAULT_TOKEN_TTL_SECS};
