// ============================
// crates/backend-lib/src/storage/flat_file.rs
// ============================
//! Flat-file credential store: one JSON document per identity.
use super::{
    key_matches, select_page, CredentialStore, Identity, IdentityFilter, IdentityPage, NewIdentity,
    StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use habits_common::{IdentityId, Role};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs as tokio_fs, io::AsyncWriteExt, sync::Mutex};

/// On-disk layout of an identity. Only ever written under the store root.
#[derive(Serialize, Deserialize)]
struct IdentityRecord {
    id: IdentityId,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Role,
    is_active: bool,
    is_locked: bool,
    failed_attempts: u32,
    last_failed_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Identity> for IdentityRecord {
    fn from(i: &Identity) -> Self {
        Self {
            id: i.id,
            email: i.email.clone(),
            password_hash: i.password_hash.clone(),
            first_name: i.first_name.clone(),
            last_name: i.last_name.clone(),
            role: i.role,
            is_active: i.is_active,
            is_locked: i.is_locked,
            failed_attempts: i.failed_attempts,
            last_failed_login_at: i.last_failed_login_at,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

impl From<IdentityRecord> for Identity {
    fn from(r: IdentityRecord) -> Self {
        Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            role: r.role,
            is_active: r.is_active,
            is_locked: r.is_locked,
            failed_attempts: r.failed_attempts,
            last_failed_login_at: r.last_failed_login_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Flat-file implementation of the `CredentialStore` trait
#[derive(Clone)]
pub struct FlatFileCredentialStore {
    root: PathBuf,
    /// Serializes writers so id allocation and email uniqueness hold
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileCredentialStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("identities"))?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn identity_path(&self, id: IdentityId) -> PathBuf {
        self.root.join("identities").join(format!("{id}.json"))
    }

    async fn read_record(&self, path: &Path) -> Result<Identity, StoreError> {
        let content = tokio_fs::read_to_string(path).await?;
        let record: IdentityRecord = serde_json::from_str(&content)?;
        Ok(record.into())
    }

    async fn read_all(&self) -> Result<Vec<Identity>, StoreError> {
        let mut entries = tokio_fs::read_dir(self.root.join("identities")).await?;
        let mut identities = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            identities.push(self.read_record(&path).await?);
        }
        identities.sort_by_key(|identity| identity.id);
        Ok(identities)
    }

    /// Write through a temp file and rename so readers never see a torn record
    async fn write_record(&self, identity: &Identity) -> Result<(), StoreError> {
        let path = self.identity_path(identity.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&IdentityRecord::from(identity))?;

        let mut file = tokio_fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FlatFileCredentialStore {
    async fn get(&self, id: IdentityId, email: &str) -> Result<Option<Identity>, StoreError> {
        if id != 0 {
            let path = self.identity_path(id);
            if tokio_fs::try_exists(&path).await? {
                return Ok(Some(self.read_record(&path).await?));
            }
        }
        if email.is_empty() {
            return Ok(None);
        }
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|identity| key_matches(identity, id, email)))
    }

    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let existing = self.read_all().await?;
        if !existing.iter().any(|other| other.id == identity.id) {
            return Err(StoreError::NotFound(identity.id));
        }
        if existing
            .iter()
            .any(|other| other.id != identity.id && other.email == identity.email)
        {
            return Err(StoreError::DuplicateEmail(identity.email.clone()));
        }
        self.write_record(identity).await
    }

    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let _guard = self.write_lock.lock().await;
        let existing = self.read_all().await?;
        if existing.iter().any(|other| other.email == new.email) {
            return Err(StoreError::DuplicateEmail(new.email));
        }
        let next_id = existing.last().map_or(1, |last| last.id + 1);
        let identity = new.into_identity(next_id, Utc::now());
        self.write_record(&identity).await?;
        Ok(identity)
    }

    async fn list(&self, filter: &IdentityFilter) -> Result<IdentityPage, StoreError> {
        Ok(select_page(self.read_all().await?, filter))
    }
}
