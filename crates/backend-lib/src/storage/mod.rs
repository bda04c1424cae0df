// ============================
// crates/backend-lib/src/storage/mod.rs
// ============================
//! Credential store abstraction with in-memory and flat-file backends.
//!
//! The store owns identities; the rest of the crate only reads snapshots and
//! writes back whole records. Lookups take an id and an email where `0` /
//! `""` means "ignore this key", so one call serves both id-based and
//! email-based resolution.

mod flat_file;
mod memory;

pub use flat_file::FlatFileCredentialStore;
pub use memory::InMemoryCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use habits_common::{IdentityId, PageMetadata, Role, UserView};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors raised by credential store backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt identity record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Identity {0} does not exist")]
    NotFound(IdentityId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Durable record of one account
#[derive(Clone, PartialEq)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    /// PHC-formatted scrypt hash
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_locked: bool,
    pub failed_attempts: u32,
    pub last_failed_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Hand-written so the hash never reaches a log line.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("is_locked", &self.is_locked)
            .field("failed_attempts", &self.failed_attempts)
            .field("last_failed_login_at", &self.last_failed_login_at)
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Client-facing projection
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            user_role: self.role,
            is_active: self.is_active,
            is_locked: self.is_locked,
            created_at: self.created_at,
        }
    }
}

/// Data needed to create an identity; the store assigns the id
#[derive(Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

impl NewIdentity {
    /// Build the stored record for a freshly registered account
    pub(crate) fn into_identity(self, id: IdentityId, now: DateTime<Utc>) -> Identity {
        Identity {
            id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            is_active: true,
            is_locked: false,
            failed_attempts: 0,
            last_failed_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Columns a listing may be sorted by; prefix with `-` for descending
pub const SORT_SAFE_LIST: [&str; 4] = ["id", "email", "first_name", "last_name"];

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Filters, search and paging for listing identities
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct IdentityFilter {
    /// Case-insensitive prefix of email, first name or last name
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub is_locked: Option<bool>,
    pub role: Option<Role>,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    pub sort: String,
}

impl Default for IdentityFilter {
    fn default() -> Self {
        Self {
            search: None,
            is_active: None,
            is_locked: None,
            role: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: "id".to_string(),
        }
    }
}

impl IdentityFilter {
    pub fn matches(&self, identity: &Identity) -> bool {
        self.is_active.map_or(true, |v| identity.is_active == v)
            && self.is_locked.map_or(true, |v| identity.is_locked == v)
            && self.role.map_or(true, |r| identity.role == r)
            && self.matches_search(identity)
    }

    fn matches_search(&self, identity: &Identity) -> bool {
        let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) else {
            return true;
        };
        let prefix = search.to_lowercase();
        [
            Some(identity.email.as_str()),
            identity.first_name.as_deref(),
            identity.last_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().starts_with(&prefix))
    }

    /// Sort column and direction; `true` means descending
    pub fn sort_column(&self) -> (&str, bool) {
        match self.sort.strip_prefix('-') {
            Some(column) => (column, true),
            None => (self.sort.as_str(), false),
        }
    }

    fn compare(&self, a: &Identity, b: &Identity) -> Ordering {
        let (column, descending) = self.sort_column();
        let ordering = match column {
            "email" => a.email.cmp(&b.email),
            "first_name" => a.first_name.cmp(&b.first_name),
            "last_name" => a.last_name.cmp(&b.last_name),
            _ => a.id.cmp(&b.id),
        };
        let ordering = if descending { ordering.reverse() } else { ordering };
        ordering.then(a.id.cmp(&b.id))
    }
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct IdentityPage {
    pub identities: Vec<Identity>,
    pub metadata: PageMetadata,
}

/// Filter, sort and slice a full scan of records
pub(crate) fn select_page(
    records: impl IntoIterator<Item = Identity>,
    filter: &IdentityFilter,
) -> IdentityPage {
    let mut matching: Vec<Identity> =
        records.into_iter().filter(|identity| filter.matches(identity)).collect();
    matching.sort_by(|a, b| filter.compare(a, b));

    let total = matching.len() as u64;
    let page_size = filter.page_size.max(1) as usize;
    let offset = (filter.page.max(1) as usize - 1).saturating_mul(page_size);
    let identities = matching.into_iter().skip(offset).take(page_size).collect();

    IdentityPage {
        identities,
        metadata: PageMetadata::new(total, filter.page, filter.page_size),
    }
}

/// Trait for credential store backends
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find an identity by id or email. `id == 0` / empty `email` ignores that key.
    async fn get(&self, id: IdentityId, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Replace the stored record with `identity`, matched by id
    async fn update(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Insert a new identity, rejecting duplicate emails
    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    /// The requested page of identities matching `filter`
    async fn list(&self, filter: &IdentityFilter) -> Result<IdentityPage, StoreError>;
}

/// Shared lookup rule for backends that scan records
pub(crate) fn key_matches(identity: &Identity, id: IdentityId, email: &str) -> bool {
    (id != 0 && identity.id == id) || (!email.is_empty() && identity.email == email)
}
