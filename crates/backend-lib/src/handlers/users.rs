// ============================
// crates/backend-lib/src/handlers/users.rs
// ============================
//! Account endpoints.
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        FromRequest, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use habits_common::{IdentityId, LoginRequest, LoginResponse, RegisterRequest, UpdateUserRequest};
use serde_json::{json, Value};

use crate::auth::KnownPrincipal;
use crate::error::AppError;
use crate::storage::{CredentialStore, IdentityFilter};
use crate::validation::{validate_list, validate_login};
use crate::AppState;

/// `Json` whose rejections use the API error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn register<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let identity = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": identity.view() }))))
}

pub async fn login<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (email, password) = validate_login(&req)?;
    let success = state.auth.login(email, password).await?;
    Ok(Json(LoginResponse {
        access_token: success.access_token,
        user: success.identity.view(),
    }))
}

pub async fn me<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    KnownPrincipal(principal): KnownPrincipal,
) -> Result<Json<Value>, AppError> {
    let identity = state
        .store
        .get(principal.id, "")
        .await?
        .ok_or(AppError::PrincipalNotFound(principal.id))?;
    Ok(Json(json!({ "data": identity.view() })))
}

pub async fn update_user<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    KnownPrincipal(principal): KnownPrincipal,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    state.auth.update(principal.id, req).await?;
    Ok(Json(json!({ "message": "user updated" })))
}

pub async fn list_users<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    filter: Result<Query<IdentityFilter>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(filter) = filter.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    validate_list(&filter)?;

    let page = state.store.list(&filter).await?;
    let users: Vec<_> = page.identities.iter().map(|identity| identity.view()).collect();
    Ok(Json(json!({ "result": users, "metadata": page.metadata })))
}

pub async fn unlock_user<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<IdentityId>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    state.auth.unlock(id).await?;
    Ok(Json(json!({ "message": format!("user {id} unlocked") })))
}
