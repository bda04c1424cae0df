//! Request-scoped principal.
//!
//! The authentication middleware resolves exactly one [`Principal`] per
//! request and stores it in the request extensions; handlers and gates read
//! it back through the typed extractor below.

use axum::{extract::FromRequestParts, http::request::Parts};
use habits_common::{IdentityId, Role, ANONYMOUS_PRINCIPAL_ID};

use crate::error::AppError;
use crate::storage::Identity;

/// Snapshot of an identity taken when the request was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub id: IdentityId,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Authenticated(AuthenticatedPrincipal),
}

impl Principal {
    pub fn from_identity(identity: &Identity) -> Self {
        Principal::Authenticated(AuthenticatedPrincipal {
            id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            is_active: identity.is_active,
            is_locked: identity.is_locked,
        })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    /// Id recorded in activity events; `-1` for anonymous
    pub fn activity_id(&self) -> IdentityId {
        match self {
            Principal::Anonymous => ANONYMOUS_PRINCIPAL_ID,
            Principal::Authenticated(p) => p.id,
        }
    }

    /// The snapshot, if this is a known, active and unlocked identity
    pub fn known(&self) -> Option<&AuthenticatedPrincipal> {
        match self {
            Principal::Authenticated(p) if p.is_active && !p.is_locked => Some(p),
            _ => None,
        }
    }
}

/// Marker placed on the response so outer layers know who was served
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPrincipalId(pub IdentityId);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AppError::Internal("principal not resolved for request".to_string()))
    }
}

/// Extractor for handlers that need a known principal
#[derive(Debug, Clone)]
pub struct KnownPrincipal(pub AuthenticatedPrincipal);

impl<S> FromRequestParts<S> for KnownPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        principal
            .known()
            .cloned()
            .map(KnownPrincipal)
            .ok_or(AppError::Unauthenticated("known principal required"))
    }
}
