//! Bearer token resolution.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::debug;

use crate::auth::{Principal, ResolvedPrincipalId, TokenCodec};
use crate::error::AppError;
use crate::metrics::TOKEN_REJECTED;
use crate::storage::CredentialStore;
use crate::AppState;

/// Pull the token out of an `Authorization` header.
///
/// `Ok(None)` when the header is absent; the value must otherwise be exactly
/// `Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AppError::MalformedAuthHeader)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(Some(token)),
        _ => Err(AppError::MalformedAuthHeader),
    }
}

/// Resolve the principal for one request against the current store record
pub async fn resolve_principal<S: CredentialStore + ?Sized>(
    headers: &HeaderMap,
    store: &S,
    codec: &TokenCodec,
    now: DateTime<Utc>,
) -> Result<Principal, AppError> {
    let Some(token) = bearer_token(headers)? else {
        return Ok(Principal::Anonymous);
    };

    let claims = codec.verify(token, now).inspect_err(|_| {
        counter!(TOKEN_REJECTED).increment(1);
    })?;

    let identity = store
        .get(claims.id, "")
        .await?
        .ok_or(AppError::PrincipalNotFound(claims.id))?;

    debug!(id = identity.id, "Principal resolved");
    Ok(Principal::from_identity(&identity))
}

/// Attach the resolved [`Principal`] to the request
pub async fn authenticate<S: CredentialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = resolve_principal(
        request.headers(),
        state.store.as_ref(),
        &state.codec,
        state.clock.now(),
    )
    .await;

    let mut response = match resolved {
        Ok(principal) => {
            let principal_id = principal.activity_id();
            request.extensions_mut().insert(principal);
            let mut response = next.run(request).await;
            response
                .extensions_mut()
                .insert(ResolvedPrincipalId(principal_id));
            response
        },
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("authorization"));
    response
}
