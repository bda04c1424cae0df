// ==============================
// tests/integration/auth_flow_tests.rs
// ==============================
//! Register, login, lockout and token handling over HTTP.
use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::json;

use crate::test_utils::TestApp;

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new();

    let (status, body) = app.register("a@x.com", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "a@x.com");
    assert_eq!(body["data"]["user_role"], "user");
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = app.login("a@x.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "a@x.com");
}

#[tokio::test]
async fn test_lockout_after_five_failures() {
    let app = TestApp::new();
    app.register("a@x.com", "secret1").await;

    for _ in 0..5 {
        let (status, body) = app.login("a@x.com", "wrong-pass").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_005");
    }

    // Correct password, but locked: same response as a wrong password.
    let (status, body) = app.login("a@x.com", "secret1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid credentials", "code": "AUTH_005" }));
    assert_eq!(
        app.recorder.last().unwrap().error_message.as_deref(),
        Some("User is locked")
    );

    app.clock.advance(Duration::hours(24));
    let (status, _) = app.login("a@x.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_email_is_indistinguishable() {
    let app = TestApp::new();
    app.register("a@x.com", "secret1").await;

    let (status_unknown, body_unknown) = app.login("nobody@x.com", "secret1").await;
    let (status_wrong, body_wrong) = app.login("a@x.com", "wrong-pass").await;
    assert_eq!(status_unknown, status_wrong);
    assert_eq!(body_unknown, body_wrong);
}

#[tokio::test]
async fn test_garbage_bearer_token() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid token", "code": "AUTH_002" }));
}

#[tokio::test]
async fn test_anonymous_requests() {
    let app = TestApp::new();

    // Public routes work without a header.
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // Gated routes reject anonymous callers with 401, not a resolution error.
    let (status, body) = app.send(Method::GET, "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_003");
}

#[tokio::test]
async fn test_expired_token() {
    let app = TestApp::new();
    let (_, token) = app.signed_in("a@x.com", "secret1").await;

    app.clock.advance(Duration::hours(24) + Duration::seconds(1));
    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_002");
}

#[tokio::test]
async fn test_locked_principal_cannot_use_existing_token() {
    let app = TestApp::new();
    let (_, token) = app.signed_in("a@x.com", "secret1").await;

    for _ in 0..5 {
        app.login("a@x.com", "wrong-pass").await;
    }
    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_003");
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new();
    let (_, token) = app.signed_in("a@x.com", "secret1").await;

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/v1/users",
            Some(&token),
            Some(json!({ "new_password": "secret2", "new_password_confirm": "secret2" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_001");

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/v1/users",
            Some(&token),
            Some(json!({
                "old_password": "secret1",
                "new_password": "secret2",
                "new_password_confirm": "secret2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.login("a@x.com", "secret1").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("a@x.com", "secret2").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_registration_validation() {
    let app = TestApp::new();

    let (status, body) = app.register("not-an-email", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_001");

    let (status, _) = app.register("a@x.com", "short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.register("a@x.com", "secret1").await;
    let (status, body) = app.register("a@x.com", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_002");

    let (status, body) = app
        .send(Method::POST, "/api/v1/register", None, Some(json!({ "email": 3 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_001");
}
