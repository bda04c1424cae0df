// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP route table and layer stack.
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use habits_common::Role;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, list_users, login, me, register, unlock_user, update_user};
use crate::middleware::{admission, authenticate, enforce, record_activity, GateChain, GateState};
use crate::storage::CredentialStore;
use crate::AppState;

/// Create the API router.
///
/// Layers run outermost first: activity, admission, authentication, then
/// the route's gate chain.
pub fn create_router<S: CredentialStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/v1/register", post(register::<S>))
        .route("/api/v1/login", post(login::<S>));

    let known = Router::new()
        .route("/api/v1/users/me", get(me::<S>))
        .route("/api/v1/users", patch(update_user::<S>))
        .route_layer(from_fn_with_state(
            GateState::new(state.clone(), GateChain::known()),
            enforce::<S>,
        ));

    let admin = Router::new()
        .route("/api/v1/users", get(list_users::<S>))
        .route("/api/v1/users/{id}/unlock", post(unlock_user::<S>))
        .route_layer(from_fn_with_state(
            GateState::new(state.clone(), GateChain::role(Role::Admin)),
            enforce::<S>,
        ));

    public
        .merge(known)
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), authenticate::<S>))
        .layer(from_fn_with_state(state.clone(), admission::<S>))
        .layer(from_fn_with_state(state.clone(), record_activity::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
