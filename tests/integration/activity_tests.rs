//! Activity events for served and rejected requests.
use axum::http::{Method, StatusCode};

use crate::test_utils::TestApp;

#[tokio::test]
async fn test_every_request_is_recorded() {
    let app = TestApp::new();
    let (id, token) = app.signed_in("a@x.com", "secret1").await;

    app.send(Method::GET, "/api/v1/users/me", Some(&token), None)
        .await;
    app.send(Method::GET, "/api/v1/users/me", Some("garbage"), None)
        .await;
    app.send(Method::GET, "/api/v1/users/me", None, None).await;

    let events = app.recorder.events();
    assert_eq!(events.len(), 5);

    // register and login resolve no principal
    assert_eq!(events[0].principal_id, -1);
    assert_eq!(events[0].status_code, 201);
    assert_eq!(events[1].principal_id, -1);

    assert_eq!(events[2].principal_id, id);
    assert_eq!(events[2].status_code, 200);
    assert_eq!(events[2].path, "/api/v1/users/me");
    assert!(events[2].error_message.is_none());

    assert_eq!(events[3].principal_id, -1);
    assert_eq!(events[3].status_code, 401);
    assert!(events[3]
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Invalid token"));

    assert_eq!(events[4].principal_id, -1);
    assert_eq!(events[4].status_code, 401);
}

#[tokio::test]
async fn test_gate_rejection_keeps_resolved_principal() {
    let app = TestApp::new();
    let (id, token) = app.signed_in("a@x.com", "secret1").await;

    let (status, _) = app.send(Method::GET, "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let event = app.recorder.last().unwrap();
    assert_eq!(event.principal_id, id);
    assert_eq!(event.status_code, 403);
    assert_eq!(
        event.error_message.as_deref(),
        Some("Forbidden: role admin required")
    );
}

#[tokio::test]
async fn test_unknown_route_is_recorded() {
    let app = TestApp::new();
    let (status, _) = app.send(Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.recorder.last().unwrap().status_code, 404);
}
