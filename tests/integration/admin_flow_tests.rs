//! Role-gated routes.
use axum::http::{Method, StatusCode};
use habits_backend_lib::storage::CredentialStore;
use habits_common::Role;
use serde_json::{json, Value};

use crate::test_utils::TestApp;

async fn set_role(app: &TestApp, id: i64, role: Role) {
    let mut identity = app.state.store.get(id, "").await.unwrap().unwrap();
    identity.role = role;
    app.state.store.update(&identity).await.unwrap();
}

#[tokio::test]
async fn test_role_change_applies_without_new_token() {
    let app = TestApp::new();
    let (id, token) = app.signed_in("a@x.com", "secret1").await;

    let (status, body) = app.send(Method::GET, "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUTH_004");

    set_role(&app, id, Role::Admin).await;
    let (status, body) = app.send(Method::GET, "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"].as_array().unwrap().len(), 1);

    // And back: a demoted admin loses access with the same token.
    set_role(&app, id, Role::User).await;
    let (status, _) = app.send(Method::GET, "/api/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_anonymous_admin_route_is_401() {
    let app = TestApp::new();
    let (status, _) = app.send(Method::GET, "/api/v1/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_filters() {
    let app = TestApp::new();
    let (admin_id, admin_token) = app.signed_in("admin@x.com", "secret1").await;
    set_role(&app, admin_id, Role::Admin).await;

    app.register("b@x.com", "secret1").await;
    for _ in 0..5 {
        app.login("b@x.com", "wrong-pass").await;
    }

    let (status, body) = app
        .send(Method::GET, "/api/v1/users?is_locked=true", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let locked = body["result"].as_array().unwrap();
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0]["email"], "b@x.com");

    let (_, body) = app
        .send(Method::GET, "/api/v1/users?role=admin", Some(&admin_token), None)
        .await;
    assert_eq!(body["result"][0]["email"], "admin@x.com");

    let (status, _) = app
        .send(Method::GET, "/api/v1/users?role=owner", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn register_named(app: &TestApp, email: &str, first: &str, last: &str) {
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/register",
            None,
            Some(json!({
                "email": email,
                "password": "secret1",
                "password_confirm": "secret1",
                "first_name": first,
                "last_name": last,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn list(app: &TestApp, token: &str, query: &str) -> (StatusCode, Value) {
    app.send(Method::GET, &format!("/api/v1/users{query}"), Some(token), None)
        .await
}

fn emails(body: &Value) -> Vec<&str> {
    body["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["email"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_list_search_sort_and_paging() {
    let app = TestApp::new();
    let (admin_id, admin_token) = app.signed_in("admin@x.com", "secret1").await;
    set_role(&app, admin_id, Role::Admin).await;

    register_named(&app, "carol@x.com", "Carol", "Smith").await;
    register_named(&app, "dave@x.com", "Dave", "Smithers").await;
    register_named(&app, "erin@x.com", "Erin", "Jones").await;

    let (status, body) = list(&app, &admin_token, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["total_records"], 4);
    assert_eq!(body["metadata"]["page_size"], 50);
    assert_eq!(body["metadata"]["current_page"], 1);
    assert_eq!(body["metadata"]["last_page"], 1);

    let (_, body) = list(&app, &admin_token, "?search=smi").await;
    assert_eq!(emails(&body), ["carol@x.com", "dave@x.com"]);

    let (_, body) = list(&app, &admin_token, "?search=ERIN").await;
    assert_eq!(emails(&body), ["erin@x.com"]);

    let (_, body) = list(&app, &admin_token, "?sort=-email").await;
    assert_eq!(
        emails(&body),
        ["erin@x.com", "dave@x.com", "carol@x.com", "admin@x.com"]
    );

    let (_, body) = list(&app, &admin_token, "?sort=email&page=2&page_size=3").await;
    assert_eq!(emails(&body), ["erin@x.com"]);
    assert_eq!(body["metadata"]["current_page"], 2);
    assert_eq!(body["metadata"]["last_page"], 2);
    assert_eq!(body["metadata"]["total_records"], 4);

    let (status, body) = list(&app, &admin_token, "?sort=password_hash").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_001");

    let (status, _) = list(&app, &admin_token, "?page_size=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = list(&app, &admin_token, "?page=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_unlock() {
    let app = TestApp::new();
    let (admin_id, admin_token) = app.signed_in("admin@x.com", "secret1").await;
    set_role(&app, admin_id, Role::Admin).await;

    let (_, body) = app.register("b@x.com", "secret1").await;
    let locked_id = body["data"]["id"].as_i64().unwrap();
    for _ in 0..5 {
        app.login("b@x.com", "wrong-pass").await;
    }
    assert_eq!(app.login("b@x.com", "secret1").await.0, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/users/{locked_id}/unlock"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.login("b@x.com", "secret1").await.0, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/v1/users/999/unlock", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NF_001");
}

#[tokio::test]
async fn test_user_cannot_unlock() {
    let app = TestApp::new();
    let (id, token) = app.signed_in("a@x.com", "secret1").await;
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/users/{id}/unlock"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
