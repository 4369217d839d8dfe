// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Administrator setup, login and password recovery routes.

use crate::error::Result;
use crate::middleware::auth::{AuthAdmin, SESSION_COOKIE};
use crate::models::DeviceInfo;
use crate::routes::{blocking, ok, ok_with, validated, Envelope, NoData};
use crate::services::{QuestionInput, SecurityPrompt};
use crate::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Routes reachable without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/setup-status", get(setup_status))
        .route("/api/admin/setup", post(setup))
        .route("/api/admin/login", post(login))
        .route("/api/admin/forgot-password", post(forgot_password))
        .route(
            "/api/admin/verify-security-answers",
            post(verify_security_answers),
        )
        .route("/api/admin/reset-password", post(reset_password))
}

/// Routes behind `require_auth` (applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/me", get(me))
}

// ─── Cookies ─────────────────────────────────────────────────

/// HttpOnly, SameSite=Strict session cookie.
fn session_cookie(token: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(time::Duration::seconds(max_age_seconds))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}

/// Expired copy of the session cookie, same attributes.
fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    session_cookie(String::new(), 0, secure)
}

fn device_info(headers: &HeaderMap) -> DeviceInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    };

    DeviceInfo {
        user_agent: header("user-agent"),
        ip: header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string())),
        platform: header("sec-ch-ua-platform"),
    }
}

// ─── Setup ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupStatusResponse {
    is_setup: bool,
}

async fn setup_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<SetupStatusResponse>>> {
    let is_setup = state.admin.setup_status()?;
    Ok(ok(SetupStatusResponse { is_setup }))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct SetupRequest {
    #[validate(length(min = 3, max = 64))]
    username: String,
    #[validate(length(min = 8))]
    password: String,
    #[validate(length(min = 3, max = 4))]
    security_questions: Vec<QuestionInput>,
}

async fn setup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetupRequest>,
) -> Result<Json<Envelope<NoData>>> {
    let body = validated(body)?;
    blocking(&state, move |s| {
        s.admin
            .setup(&body.username, &body.password, &body.security_questions)
            .map(|_| ())
    })
    .await?;
    Ok(ok_with("Admin setup completed successfully", NoData {}))
}

// ─── Login / logout ──────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    #[validate(length(min = 1, message = "Username and password required"))]
    username: String,
    #[validate(length(min = 1, message = "Username and password required"))]
    password: String,
    #[serde(default)]
    remember_me: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminSummary {
    username: String,
    last_login: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    admin: AdminSummary,
    expires_at: DateTime<Utc>,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Envelope<LoginResponse>>)> {
    let body = validated(body)?;
    let device = device_info(&headers);
    let outcome = blocking(&state, move |s| {
        s.admin
            .login(&body.username, &body.password, body.remember_me, device)
    })
    .await?;

    let cookie = session_cookie(
        outcome.token.clone(),
        outcome.lifetime().num_seconds(),
        state.config.secure_cookies(),
    );

    Ok((
        jar.add(cookie),
        ok_with(
            "Login successful",
            LoginResponse {
                admin: AdminSummary {
                    username: outcome.username,
                    last_login: outcome.last_login,
                },
                expires_at: outcome.session.expires_at,
            },
        ),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Envelope<NoData>>)> {
    let session_id = admin.session_id;
    blocking(&state, move |s| s.admin.logout(&session_id)).await?;
    let jar = jar.add(clear_session_cookie(state.config.secure_cookies()));
    Ok((jar, ok_with("Logged out successfully", NoData {})))
}

#[derive(Serialize)]
struct MeResponse {
    admin: MeAdmin,
}

#[derive(Serialize)]
struct MeAdmin {
    username: String,
}

async fn me(Extension(admin): Extension<AuthAdmin>) -> Json<Envelope<MeResponse>> {
    ok(MeResponse {
        admin: MeAdmin {
            username: admin.username,
        },
    })
}

// ─── Password recovery ───────────────────────────────────────

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    #[serde(default)]
    username: String,
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Envelope<SecurityPrompt>>> {
    let prompt = state.admin.forgot_password(&body.username)?;
    Ok(ok(prompt))
}

#[derive(Deserialize, Validate)]
struct VerifyAnswersRequest {
    #[validate(length(min = 1))]
    username: String,
    #[validate(length(min = 1, message = "All security answers required"))]
    answers: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetTokenResponse {
    reset_token: String,
}

async fn verify_security_answers(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyAnswersRequest>,
) -> Result<Json<Envelope<ResetTokenResponse>>> {
    let body = validated(body)?;
    let reset_token = blocking(&state, move |s| {
        s.admin
            .verify_security_answers(&body.username, &body.answers)
    })
    .await?;
    Ok(ok_with(
        "Security questions verified successfully",
        ResetTokenResponse { reset_token },
    ))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token and new password required"))]
    reset_token: String,
    #[validate(length(min = 8))]
    new_password: String,
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<Envelope<NoData>>)> {
    let body = validated(body)?;
    blocking(&state, move |s| {
        s.admin
            .reset_password(&body.reset_token, &body.new_password)
    })
    .await?;
    let jar = jar.add(clear_session_cookie(state.config.secure_cookies()));
    Ok((
        jar,
        ok_with("Password reset successfully. Please log in again.", NoData {}),
    ))
}
