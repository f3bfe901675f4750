//! Error model for intelhub.
//!
//! Two layers live here:
//! - `AuthError`: the domain taxonomy returned by every core operation
//!   (credential store, authentication service, access guard, domain records).
//!   It classifies the failure and never carries UI text.
//! - `AppError`: the frontend error shape (code + message, serde-tagged) used by
//!   the HTTP boundary, with a status mapping.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username (or other unique key such as a ticket number) is taken.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// Role string outside the closed role enumeration.
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("invalid username: {0}")]
    InvalidUsername(String),
    #[error("weak password: {0}")]
    WeakPassword(String),
    /// Malformed domain record input (empty subject, negative size, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Unknown user and wrong password deliberately share this variant.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("access denied: {resource}")]
    AccessDenied { resource: String },
    #[error("not authenticated")]
    Unauthenticated,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage fault: {0}")]
    StorageFault(#[source] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn access_denied<S: Into<String>>(resource: S) -> Self {
        AuthError::AccessDenied { resource: resource.into() }
    }

    /// Stable machine-readable code for this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AlreadyExists(_) => "already_exists",
            AuthError::InvalidRole(_) => "invalid_role",
            AuthError::InvalidUsername(_) => "invalid_username",
            AuthError::WeakPassword(_) => "weak_password",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccessDenied { .. } => "access_denied",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::NotFound(_) => "not_found",
            AuthError::StorageFault(_) => "storage_fault",
            AuthError::Internal(_) => "internal",
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let code = err.code().to_string();
        match err {
            AuthError::AlreadyExists(_) => AppError::Conflict { code, message: err.to_string() },
            AuthError::InvalidRole(_)
            | AuthError::InvalidUsername(_)
            | AuthError::WeakPassword(_)
            | AuthError::InvalidInput(_) => AppError::UserInput { code, message: err.to_string() },
            AuthError::InvalidCredentials | AuthError::Unauthenticated => AppError::Auth { code, message: err.to_string() },
            AuthError::AccessDenied { .. } => AppError::Forbidden { code, message: err.to_string() },
            AuthError::NotFound(_) => AppError::NotFound { code, message: err.to_string() },
            // Storage details stay in the logs; the client only learns the kind.
            AuthError::StorageFault(_) => AppError::Io { code, message: "storage unavailable".into() },
            AuthError::Internal(_) => AppError::Internal { code, message: "internal error".into() },
        }
    }
}
