// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Session authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub use crate::services::admin::AuthAdmin;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "rk_admin_token";

/// Middleware that requires a valid admin session.
///
/// The token comes from the session cookie, or failing that from an
/// `Authorization: Bearer` header.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => bearer_token(&request).ok_or(AppError::Unauthenticated)?,
    };

    let admin = state.admin.verify_session(&token)?;
    request.extensions_mut().insert(admin);

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
