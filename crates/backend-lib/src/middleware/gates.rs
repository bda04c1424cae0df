//! Per-route authorization gates.
//!
//! A route carries an ordered [`GateChain`]; one runner evaluates it and
//! stops at the first failing gate.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use habits_common::Role;
use metrics::counter;
use tracing::debug;

use crate::auth::Principal;
use crate::error::AppError;
use crate::metrics::GATE_REJECTED;
use crate::storage::CredentialStore;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Authenticated, active and unlocked
    RequireKnownPrincipal,
    /// Stored role must equal the given role
    RequireRole(Role),
}

impl Gate {
    pub fn name(&self) -> &'static str {
        match self {
            Gate::RequireKnownPrincipal => "require_known_principal",
            Gate::RequireRole(_) => "require_role",
        }
    }

    async fn check<S: CredentialStore + ?Sized>(
        &self,
        principal: &Principal,
        store: &S,
    ) -> Result<(), AppError> {
        match self {
            Gate::RequireKnownPrincipal => principal
                .known()
                .map(|_| ())
                .ok_or(AppError::Unauthenticated("known principal required")),
            Gate::RequireRole(required) => {
                let Principal::Authenticated(p) = principal else {
                    return Err(AppError::Unauthenticated("anonymous principal"));
                };
                // The token's role may be stale; authorize against the store.
                let identity = store
                    .get(p.id, "")
                    .await?
                    .ok_or(AppError::Unauthenticated("identity no longer exists"))?;
                if identity.role != *required {
                    return Err(AppError::Forbidden {
                        required: *required,
                    });
                }
                Ok(())
            },
        }
    }
}

/// Ordered gates for one route
#[derive(Debug, Clone, Default)]
pub struct GateChain(Vec<Gate>);

impl GateChain {
    pub fn new(gates: impl IntoIterator<Item = Gate>) -> Self {
        Self(gates.into_iter().collect())
    }

    /// Known principal only
    pub fn known() -> Self {
        Self::new([Gate::RequireKnownPrincipal])
    }

    /// Known principal holding `role`
    pub fn role(role: Role) -> Self {
        Self::new([Gate::RequireKnownPrincipal, Gate::RequireRole(role)])
    }

    pub fn gates(&self) -> &[Gate] {
        &self.0
    }

    /// Run every gate in order, short-circuiting on the first failure
    pub async fn run<S: CredentialStore + ?Sized>(
        &self,
        principal: &Principal,
        store: &S,
    ) -> Result<(), AppError> {
        for gate in &self.0 {
            if let Err(err) = gate.check(principal, store).await {
                counter!(GATE_REJECTED, "gate" => gate.name()).increment(1);
                debug!(gate = gate.name(), "Gate rejected request");
                return Err(err);
            }
        }
        Ok(())
    }
}

/// State for [`enforce`]: the app plus the chain of one route
pub struct GateState<S> {
    pub app: Arc<AppState<S>>,
    pub chain: Arc<GateChain>,
}

impl<S> Clone for GateState<S> {
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            chain: self.chain.clone(),
        }
    }
}

impl<S> GateState<S> {
    pub fn new(app: Arc<AppState<S>>, chain: GateChain) -> Self {
        Self {
            app,
            chain: Arc::new(chain),
        }
    }
}

/// Gate middleware, applied per route with `route_layer`
pub async fn enforce<S: CredentialStore + 'static>(
    State(gates): State<GateState<S>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| AppError::Internal("principal not resolved for request".to_string()))?;

    gates.chain.run(&principal, gates.app.store.as_ref()).await?;
    Ok(next.run(request).await)
}
