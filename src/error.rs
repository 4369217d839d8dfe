// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type shared by the store, the services and the
/// handlers. Converts to the `{success: false, ...}` JSON envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Customer already registered with ID: {id}")]
    DuplicateCustomer { id: String, field: DuplicateField },

    #[error("Account already exists")]
    DuplicateAccount,

    #[error("Admin already setup")]
    AlreadySetup,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Customer {id} already completed loyalty card")]
    AlreadyComplete { id: String },

    #[error("Account temporarily locked due to too many failed attempts")]
    AccountLocked,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Security answers verification failed")]
    VerificationFailed,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Which unique key a duplicate insert collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Id,
    Mobile,
}

impl AppError {
    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::DuplicateCustomer { .. } => "duplicate_customer",
            AppError::DuplicateAccount => "duplicate_account",
            AppError::AlreadySetup => "already_setup",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyComplete { .. } => "already_complete",
            AppError::AccountLocked => "account_locked",
            AppError::InvalidCredentials => "auth_error",
            AppError::Unauthenticated => "unauthenticated",
            AppError::VerificationFailed => "verification_failed",
            AppError::TokenExpired => "token_expired",
            AppError::TokenInvalid => "token_invalid",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateCustomer { .. }
            | AppError::DuplicateAccount
            | AppError::AlreadySetup
            | AppError::AlreadyComplete { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AccountLocked => StatusCode::LOCKED,
            AppError::InvalidCredentials
            | AppError::Unauthenticated
            | AppError::VerificationFailed
            | AppError::TokenExpired
            | AppError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                "Storage error".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let customer_id = match &self {
            AppError::DuplicateCustomer { id, .. } | AppError::AlreadyComplete { id } => {
                Some(id.clone())
            }
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            message,
            error: self.code(),
            customer_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type Result<T> = std::result::Result<T, AppError>;
