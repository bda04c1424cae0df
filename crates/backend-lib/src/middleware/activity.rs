//! Outermost layer: times each request and reports it to the activity recorder.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use habits_common::{ActivityEvent, ANONYMOUS_PRINCIPAL_ID};
use tracing::error;
use uuid::Uuid;

use crate::auth::ResolvedPrincipalId;
use crate::error::{AppError, RecordedError};
use crate::storage::CredentialStore;
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Record every request, including rejections and handler panics
pub async fn record_activity<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let request_id = Uuid::new_v4();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%request_id, %method, %path, panic = %message, "Handler panicked");
            AppError::Internal(format!("handler panicked: {message}")).into_response()
        },
    };

    let principal_id = response
        .extensions()
        .get::<ResolvedPrincipalId>()
        .map_or(ANONYMOUS_PRINCIPAL_ID, |id| id.0);
    let error_message = response
        .extensions()
        .get::<RecordedError>()
        .map(|e| e.0.clone());

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    state.recorder.record(ActivityEvent {
        request_id,
        principal_id,
        remote_addr,
        method,
        path,
        status_code: response.status().as_u16(),
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        error_message,
        timestamp: state.clock.now(),
    });

    response
}
