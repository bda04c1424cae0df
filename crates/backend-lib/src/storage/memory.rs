//! In-process credential store.

use super::{
    key_matches, select_page, CredentialStore, Identity, IdentityFilter, IdentityPage, NewIdentity,
    StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use habits_common::IdentityId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    identities: BTreeMap<IdentityId, Identity>,
    next_id: IdentityId,
}

/// Credential store kept entirely in memory.
///
/// Cloning is cheap; clones share the same records.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities
    pub fn len(&self) -> usize {
        self.inner.read().identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, id: IdentityId, email: &str) -> Result<Option<Identity>, StoreError> {
        let inner = self.inner.read();
        if id != 0 {
            if let Some(identity) = inner.identities.get(&id) {
                return Ok(Some(identity.clone()));
            }
        }
        Ok(inner
            .identities
            .values()
            .find(|identity| key_matches(identity, id, email))
            .cloned())
    }

    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner
            .identities
            .values()
            .any(|other| other.id != identity.id && other.email == identity.email)
        {
            return Err(StoreError::DuplicateEmail(identity.email.clone()));
        }
        match inner.identities.get_mut(&identity.id) {
            Some(slot) => {
                *slot = identity.clone();
                Ok(())
            },
            None => Err(StoreError::NotFound(identity.id)),
        }
    }

    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let mut inner = self.inner.write();
        if inner.identities.values().any(|other| other.email == new.email) {
            return Err(StoreError::DuplicateEmail(new.email));
        }
        inner.next_id += 1;
        let identity = new.into_identity(inner.next_id, Utc::now());
        inner.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn list(&self, filter: &IdentityFilter) -> Result<IdentityPage, StoreError> {
        let inner = self.inner.read();
        Ok(select_page(inner.identities.values().cloned(), filter))
    }
}
