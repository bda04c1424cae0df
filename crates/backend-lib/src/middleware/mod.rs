// crates/backend-lib/src/middleware/mod.rs

//! Request pipeline layers, outermost first: activity, admission,
//! authentication, then per-route gates.

pub mod activity;
pub mod authenticate;
pub mod gates;
pub mod rate_limit;

pub use activity::record_activity;
pub use authenticate::{authenticate, bearer_token, resolve_principal};
pub use gates::{enforce, Gate, GateChain, GateState};
pub use rate_limit::{admission, AdmissionLimiter};
