//! Client-facing error bodies.
use axum::{
    body::to_bytes,
    http::StatusCode,
    response::IntoResponse,
};
use habits_backend_lib::{auth::TokenError, error::AppError, storage::StoreError};
use habits_common::{ErrorBody, Role};

async fn body_of(err: AppError) -> (StatusCode, ErrorBody) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_internal_details_never_reach_the_body() {
    let (status, body) = body_of(StoreError::Unavailable("db at 10.0.0.3 refused".into()).into()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.error, "internal server error");
    assert_eq!(body.code, "STORE_001");

    let (status, body) = body_of(TokenError::BadSignature.into()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.error, "invalid token");

    let (_, body) = body_of(AppError::PrincipalNotFound(12)).await;
    assert_eq!(body.error, "invalid token");
    assert!(!body.error.contains("12"));
}

#[tokio::test]
async fn test_gate_errors() {
    let (status, body) = body_of(AppError::Unauthenticated("anonymous principal")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.error, "unauthorized");

    let (status, body) = body_of(AppError::Forbidden { required: Role::Admin }).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.code, "AUTH_004");
}

#[test]
fn test_token_misconfiguration_is_internal() {
    let err: AppError = TokenError::MissingSecret.into();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!err.is_security_rejection());
}
