//! Settings as consumed by the application state.
use std::sync::Arc;

use habits_backend_lib::{
    activity::TracingSink, config::Settings, storage::InMemoryCredentialStore, AppState,
};

use crate::test_utils::{test_settings, CapturingRecorder};

#[test]
fn test_state_rejects_invalid_settings() {
    let mut settings = test_settings();
    settings.auth.jwt_secret.clear();
    let result = AppState::new(
        InMemoryCredentialStore::new(),
        settings,
        Arc::new(CapturingRecorder::default()),
    );
    assert!(result.is_err());

    let mut settings = test_settings();
    settings.auth.password_cost = 42;
    let result = AppState::new(
        InMemoryCredentialStore::new(),
        settings,
        Arc::new(CapturingRecorder::default()),
    );
    assert!(result.is_err());

    let mut settings = test_settings();
    settings.auth.token_ttl_secs = i64::MAX;
    let result = AppState::new(
        InMemoryCredentialStore::new(),
        settings,
        Arc::new(CapturingRecorder::default()),
    );
    assert!(result.is_err());
}

#[test]
fn test_state_carries_settings() {
    let mut settings = test_settings();
    settings.auth.lock_threshold = 3;
    let state = AppState::new(
        InMemoryCredentialStore::new(),
        settings.clone(),
        Arc::new(CapturingRecorder::default()),
    )
    .unwrap();
    assert_eq!(*state.settings, settings);
    assert_eq!(state.codec.ttl(), settings.auth.token_ttl());
}

#[test]
fn test_settings_round_trip_through_toml_layer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habits.toml");
    std::fs::write(
        &path,
        "[auth]\njwt_secret = \"file-secret\"\n[rate_limit]\nburst = 9\n",
    )
    .unwrap();

    let settings = Settings::load_from(Some(&path)).unwrap();
    assert_eq!(settings.auth.jwt_secret, "file-secret");
    assert_eq!(settings.rate_limit.burst, 9);
    assert_eq!(settings.server.port, 3000);
}

#[tokio::test]
async fn test_tracing_sink_builds_state() {
    let (dispatcher, _drain) =
        habits_backend_lib::activity::ActivityDispatcher::spawn(Arc::new(TracingSink));
    let state = AppState::new(
        InMemoryCredentialStore::new(),
        test_settings(),
        Arc::new(dispatcher),
    );
    assert!(state.is_ok());
}
