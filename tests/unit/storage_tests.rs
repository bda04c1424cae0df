//! Both credential stores behind the same contract.
use chrono::Utc;
use habits_backend_lib::storage::{
    CredentialStore, FlatFileCredentialStore, IdentityFilter, InMemoryCredentialStore,
    NewIdentity, StoreError,
};
use habits_common::Role;
use tempfile::tempdir;

fn new_identity(email: &str) -> NewIdentity {
    NewIdentity {
        email: email.to_string(),
        password_hash: "$scrypt$ln=4,r=8,p=1$c2FsdA$aGFzaA".to_string(),
        first_name: None,
        last_name: None,
        role: Role::User,
    }
}

async fn exercise<S: CredentialStore>(store: &S) {
    let a = store.create(new_identity("a@x.com")).await.unwrap();
    let b = store.create(new_identity("b@x.com")).await.unwrap();
    assert!(a.id > 0 && b.id > a.id);

    assert!(matches!(
        store.create(new_identity("a@x.com")).await,
        Err(StoreError::DuplicateEmail(_))
    ));

    assert_eq!(store.get(a.id, "").await.unwrap().unwrap().email, "a@x.com");
    assert_eq!(store.get(0, "b@x.com").await.unwrap().unwrap().id, b.id);
    assert!(store.get(0, "").await.unwrap().is_none());
    assert!(store.get(999, "").await.unwrap().is_none());

    let mut locked = a.clone();
    locked.is_locked = true;
    locked.failed_attempts = 5;
    locked.last_failed_login_at = Some(Utc::now());
    store.update(&locked).await.unwrap();
    assert_eq!(store.get(a.id, "").await.unwrap().unwrap(), locked);

    let mut taken = b.clone();
    taken.email = "a@x.com".to_string();
    assert!(matches!(
        store.update(&taken).await,
        Err(StoreError::DuplicateEmail(_))
    ));

    let filter = IdentityFilter {
        is_locked: Some(true),
        ..Default::default()
    };
    let listed = store.list(&filter).await.unwrap();
    assert_eq!(listed.identities.len(), 1);
    assert_eq!(listed.identities[0].id, a.id);
    assert_eq!(listed.metadata.total_records, 1);

    let all = store.list(&IdentityFilter::default()).await.unwrap();
    assert_eq!(all.identities.len(), 2);

    let filter = IdentityFilter {
        search: Some("B@".to_string()),
        ..Default::default()
    };
    let found = store.list(&filter).await.unwrap();
    assert_eq!(found.identities.len(), 1);
    assert_eq!(found.identities[0].id, b.id);

    let filter = IdentityFilter {
        sort: "-id".to_string(),
        page_size: 1,
        ..Default::default()
    };
    let first = store.list(&filter).await.unwrap();
    assert_eq!(first.identities[0].id, b.id);
    assert_eq!(first.metadata.last_page, 2);
}

#[tokio::test]
async fn test_in_memory_store_contract() {
    exercise(&InMemoryCredentialStore::new()).await;
}

#[tokio::test]
async fn test_flat_file_store_contract() {
    let dir = tempdir().unwrap();
    exercise(&FlatFileCredentialStore::new(dir.path()).unwrap()).await;
}

#[tokio::test]
async fn test_flat_file_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let id = {
        let store = FlatFileCredentialStore::new(dir.path()).unwrap();
        store.create(new_identity("a@x.com")).await.unwrap().id
    };
    let store = FlatFileCredentialStore::new(dir.path()).unwrap();
    assert_eq!(store.get(id, "").await.unwrap().unwrap().email, "a@x.com");
    assert_eq!(store.create(new_identity("b@x.com")).await.unwrap().id, id + 1);
}
