// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request body validation.

use habits_common::{LoginRequest, RegisterRequest, UpdateUserRequest};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::storage::{IdentityFilter, SORT_SAFE_LIST};

const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_PASSWORD_LENGTH: usize = 32;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_PAGE: u32 = 10_000_000;
const MAX_PAGE_SIZE: u32 = 100;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex compiles")
});

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid email")]
    InvalidEmail,

    #[error("{0} is required")]
    Required(&'static str),

    #[error("password must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters long")]
    PasswordLength,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("you can omit {0} but cannot send an empty string or space")]
    BlankName(&'static str),

    #[error("{field} must be between 1 and {max}")]
    OutOfRange { field: &'static str, max: u32 },

    #[error("invalid sort value: {0}")]
    UnsupportedSort(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

/// Validate a new password
pub fn validate_password(password: &str) -> ValidationResult<&str> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(ValidationError::PasswordLength);
    }
    Ok(password)
}

fn validate_optional_name(value: Option<&str>, field: &'static str) -> ValidationResult<()> {
    match value {
        Some(name) if name.trim().is_empty() => Err(ValidationError::BlankName(field)),
        _ => Ok(()),
    }
}

pub fn validate_register(req: &RegisterRequest) -> ValidationResult<()> {
    validate_email(&req.email)?;
    if req.password.is_empty() || req.password_confirm.is_empty() {
        return Err(ValidationError::Required("password and password_confirm"));
    }
    validate_password(&req.password)?;
    if req.password != req.password_confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    validate_optional_name(req.first_name.as_deref(), "first_name")?;
    validate_optional_name(req.last_name.as_deref(), "last_name")?;
    Ok(())
}

/// Validate a login body and borrow its credentials
pub fn validate_login(req: &LoginRequest) -> ValidationResult<(&str, &str)> {
    let email = req.email.as_deref().ok_or(ValidationError::Required("email"))?;
    validate_email(email)?;
    let password = req
        .password
        .as_deref()
        .ok_or(ValidationError::Required("password"))?;
    Ok((email, password))
}

pub fn validate_update(req: &UpdateUserRequest) -> ValidationResult<()> {
    if let Some(email) = req.email.as_deref() {
        validate_email(email)?;
    }
    if req.old_password.is_none() {
        return Err(ValidationError::Required("old_password"));
    }
    validate_optional_name(req.first_name.as_deref(), "first_name")?;
    validate_optional_name(req.last_name.as_deref(), "last_name")?;

    match (req.new_password.as_deref(), req.new_password_confirm.as_deref()) {
        (None, None) => Ok(()),
        (Some(new), Some(confirm)) => {
            validate_password(new)?;
            if new != confirm {
                return Err(ValidationError::PasswordMismatch);
            }
            Ok(())
        },
        _ => Err(ValidationError::Required("new_password and new_password_confirm")),
    }
}

/// Validate listing parameters before they reach a store
pub fn validate_list(filter: &IdentityFilter) -> ValidationResult<()> {
    if !(1..=MAX_PAGE).contains(&filter.page) {
        return Err(ValidationError::OutOfRange {
            field: "page",
            max: MAX_PAGE,
        });
    }
    if !(1..=MAX_PAGE_SIZE).contains(&filter.page_size) {
        return Err(ValidationError::OutOfRange {
            field: "page_size",
            max: MAX_PAGE_SIZE,
        });
    }
    let (column, _) = filter.sort_column();
    if !SORT_SAFE_LIST.contains(&column) {
        return Err(ValidationError::UnsupportedSort(filter.sort.clone()));
    }
    Ok(())
}
