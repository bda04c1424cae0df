// ================
// common/src/lib.rs
// ================
//! Common types shared between the habits API server and its clients.
//! This module defines the JSON request/response bodies of the account
//! endpoints and the activity event emitted for every request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a stored identity
pub type IdentityId = i64;

/// Principal id recorded for requests that never resolved to an identity
pub const ANONYMOUS_PRINCIPAL_ID: IdentityId = -1;

/// Role granted to an identity
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account
    #[default]
    User,
    /// Administrator, allowed to list and unlock accounts
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Body of `POST /api/v1/register`
/// # Fields
/// * `email` - Login email, must be unique
/// * `password` - Plain password (6 to 32 characters)
/// * `password_confirm` - Must equal `password`
/// * `first_name` / `last_name` - Optional, but never blank when present
#[derive(Serialize, Deserialize, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Body of `POST /api/v1/login`
#[derive(Serialize, Deserialize, Clone)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Body of `PATCH /api/v1/users`
///
/// `old_password` is always required; every other field is optional.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub old_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default)]
    pub new_password_confirm: Option<String>,
}

/// Client-facing projection of an identity.
/// Never carries the password hash or lockout counters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: IdentityId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_role: Role,
    pub is_active: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

/// Response to a successful login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    /// Signed bearer token
    pub access_token: String,
    /// The identity that logged in
    pub user: UserView,
}

/// Paging information returned alongside a listing
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMetadata {
    pub current_page: u32,
    pub page_size: u32,
    pub first_page: u32,
    /// Never below `first_page`, even for an empty listing
    pub last_page: u32,
    pub total_records: u64,
}

impl PageMetadata {
    pub fn new(total_records: u64, page: u32, page_size: u32) -> Self {
        let pages = total_records.div_ceil(u64::from(page_size.max(1)));
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: u32::try_from(pages).unwrap_or(u32::MAX).max(1),
            total_records,
        }
    }
}

/// JSON body of every error response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    /// Generic, client-safe message
    pub error: String,
    /// Stable machine-readable code
    pub code: String,
}

/// One served request, as handed to the activity recorder
/// # Fields
/// * `principal_id` - Resolved identity id, or `-1` when anonymous/unresolved
/// * `remote_addr` - Peer address, `"unknown"` when the listener did not supply it
/// * `status_code` - Final HTTP status sent to the caller
/// * `error_message` - Internal description of the failure, if any
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub request_id: Uuid,
    pub principal_id: IdentityId,
    pub remote_addr: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn is_anonymous(&self) -> bool {
        self.principal_id == ANONYMOUS_PRINCIPAL_ID
    }
}
