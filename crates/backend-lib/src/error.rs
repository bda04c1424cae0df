// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use habits_common::{ErrorBody, IdentityId, Role};
use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::auth::token::TokenError;
use crate::storage::StoreError;
use crate::validation::ValidationError;

/// Application error types with error codes and context.
///
/// The `Display` text is the internal description (logged and recorded by
/// the activity hook); clients only ever see [`AppError::sanitized_message`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed authorization header")]
    MalformedAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token references unknown identity {0}")]
    PrincipalNotFound(IdentityId),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(&'static str),

    #[error("Forbidden: role {required} required")]
    Forbidden { required: Role },

    #[error("User is locked")]
    UserLocked,

    #[error("User is inactive")]
    UserInactive,

    #[error("Credential mismatch")]
    CredentialMismatch,

    #[error("Admission rejected")]
    AdmissionRejected,

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Internal error description attached to error responses so outer layers
/// (the activity hook) can record it without re-deriving it.
#[derive(Debug, Clone)]
pub struct RecordedError(pub String);

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MalformedAuthHeader
            | AppError::InvalidToken(_)
            | AppError::PrincipalNotFound(_)
            | AppError::Unauthenticated(_)
            | AppError::UserLocked
            | AppError::UserInactive
            | AppError::CredentialMismatch => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::AdmissionRejected => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidInput(_) | AppError::EmailTaken => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Get the error code for this error.
    ///
    /// Login failures share one code so a caller cannot learn whether the
    /// email exists, is locked, or the password was wrong.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::MalformedAuthHeader => "AUTH_001",
            AppError::InvalidToken(_) | AppError::PrincipalNotFound(_) => "AUTH_002",
            AppError::Unauthenticated(_) => "AUTH_003",
            AppError::Forbidden { .. } => "AUTH_004",
            AppError::UserLocked | AppError::UserInactive | AppError::CredentialMismatch => {
                "AUTH_005"
            },
            AppError::AdmissionRejected => "RATE_001",
            AppError::StoreUnavailable(_) => "STORE_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::EmailTaken => "VAL_002",
            AppError::NotFound(_) => "NF_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for clients
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::MalformedAuthHeader => "invalid authorization header".to_string(),
            AppError::InvalidToken(_) | AppError::PrincipalNotFound(_) => {
                "invalid token".to_string()
            },
            AppError::Unauthenticated(_) => "unauthorized".to_string(),
            AppError::Forbidden { .. } => "forbidden".to_string(),
            AppError::UserLocked | AppError::UserInactive | AppError::CredentialMismatch => {
                "invalid credentials".to_string()
            },
            AppError::AdmissionRejected => "rate limit exceeded".to_string(),
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            },
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::EmailTaken => "this email already exists".to_string(),
            AppError::NotFound(_) => "resource not found".to_string(),
        }
    }

    /// Whether this error belongs to the authentication/authorization family
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self,
            AppError::MalformedAuthHeader
                | AppError::InvalidToken(_)
                | AppError::PrincipalNotFound(_)
                | AppError::Unauthenticated(_)
                | AppError::Forbidden { .. }
                | AppError::UserLocked
                | AppError::UserInactive
                | AppError::CredentialMismatch
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %detail, "request failed");
        } else if self.is_security_rejection() {
            tracing::warn!(code = self.error_code(), reason = %detail, "request rejected");
        } else {
            tracing::debug!(code = self.error_code(), reason = %detail, "request rejected");
        }

        let body = ErrorBody {
            error: self.sanitized_message(),
            code: self.error_code().to_string(),
        };

        let mut response = (status, axum::Json(body)).into_response();
        response.extensions_mut().insert(RecordedError(detail));
        response
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => AppError::EmailTaken,
            StoreError::NotFound(id) => AppError::NotFound(format!("identity {id}")),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret | TokenError::Encode(_) => AppError::Internal(err.to_string()),
            other => AppError::InvalidToken(other.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}
