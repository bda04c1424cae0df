// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const REQUEST_ADMITTED: &str = "admission.admitted";
pub const REQUEST_REJECTED: &str = "admission.rejected";
pub const LOGIN_SUCCEEDED: &str = "auth.login.succeeded";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const IDENTITY_LOCKED: &str = "auth.identity.locked";
pub const IDENTITY_UNLOCKED: &str = "auth.identity.unlocked";
pub const IDENTITY_REGISTERED: &str = "auth.identity.registered";
pub const TOKEN_REJECTED: &str = "auth.token.rejected";
pub const GATE_REJECTED: &str = "auth.gate.rejected";
pub const ACTIVITY_RECORDED: &str = "activity.recorded";
pub const ACTIVITY_DROPPED: &str = "activity.dropped";
