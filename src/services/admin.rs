// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Administrator credentials, sessions and password recovery.
//!
//! The bearer token handed to clients is an HS256 JWT naming a server-side
//! session; the session record decides validity, so logout and password
//! resets take effect immediately. Expiry is always checked against the
//! injected clock, never the JWT library's wall clock.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{AdminAccount, AdminSession, DeviceInfo, SecurityQuestion};
use crate::time_utils::Clock;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

const MAX_LOGIN_ATTEMPTS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 30;
const SESSION_HOURS: i64 = 24;
const REMEMBER_ME_DAYS: i64 = 30;
const RESET_TOKEN_MINUTES: i64 = 15;
const MIN_PASSWORD_LEN: usize = 8;
const MIN_QUESTIONS: usize = 3;
const MAX_QUESTIONS: usize = 4;

const PURPOSE_SESSION: &str = "session";
const PURPOSE_RESET: &str = "password-reset";

/// Same text for every forgot-password response.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If the username exists, security questions will be provided";

/// JWT claims for both session and reset tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Admin username
    pub sub: String,
    /// `session` or `password-reset`
    pub purpose: String,
    /// Session id (session tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Credential version (reset tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<u32>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Authenticated administrator, attached to requests by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthAdmin {
    pub username: String,
    pub session_id: String,
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub session: AdminSession,
    pub username: String,
    pub last_login: Option<DateTime<Utc>>,
}

impl LoginOutcome {
    /// Lifetime of the session, for the cookie's Max-Age.
    pub fn lifetime(&self) -> Duration {
        self.session.expires_at - self.session.issued_at
    }
}

/// Input for one security question at setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    pub question: String,
    pub answer: String,
}

/// Forgot-password response. Unknown users get the empty prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPrompt {
    pub has_security_questions: bool,
    pub security_questions: Vec<String>,
    pub message: String,
}

impl SecurityPrompt {
    fn empty() -> Self {
        Self {
            has_security_questions: false,
            security_questions: Vec::new(),
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
        }
    }
}

/// Administrator account service.
pub struct AdminAccountStore {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    signing_key: Vec<u8>,
}

impl AdminAccountStore {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, signing_key: Vec<u8>) -> Self {
        Self {
            store,
            clock,
            signing_key,
        }
    }

    // ─── Bootstrap ───────────────────────────────────────────────

    /// Whether the administrator account has been created.
    pub fn setup_status(&self) -> Result<bool> {
        self.store.has_accounts()
    }

    /// Create the one administrator account. Fails with
    /// `AppError::AlreadySetup` once any account exists.
    pub fn setup(
        &self,
        username: &str,
        password: &str,
        questions: &[QuestionInput],
    ) -> Result<AdminAccount> {
        let username = username.trim();
        if !(3..=64).contains(&username.chars().count()) {
            return Err(AppError::Validation(
                "Username must be 3 to 64 characters".to_string(),
            ));
        }
        validate_password(password)?;
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&questions.len()) {
            return Err(AppError::Validation(format!(
                "Between {MIN_QUESTIONS} and {MAX_QUESTIONS} security questions are required"
            )));
        }
        if questions
            .iter()
            .any(|q| q.question.trim().is_empty() || q.answer.trim().is_empty())
        {
            return Err(AppError::Validation(
                "Security questions and answers cannot be empty".to_string(),
            ));
        }

        // Cheap pre-check so a second setup doesn't pay for hashing.
        if self.store.has_accounts()? {
            return Err(AppError::AlreadySetup);
        }

        let security_questions = questions
            .iter()
            .map(|q| {
                Ok(SecurityQuestion {
                    question: q.question.trim().to_string(),
                    answer_hash: hash_secret(&normalize_answer(&q.answer))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let now = self.clock.now();
        let account = AdminAccount {
            username: username.to_string(),
            password_hash: hash_secret(password)?,
            security_questions,
            login_attempts: 0,
            lock_until: None,
            last_login: None,
            credential_version: 0,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_account(account.clone(), true)?;
        tracing::info!(username, "Admin setup completed");
        Ok(account)
    }

    // ─── Login & sessions ────────────────────────────────────────

    /// Check credentials and open a session.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
        device: DeviceInfo,
    ) -> Result<LoginOutcome> {
        let username = username.trim();
        let now = self.clock.now();

        let Some(account) = self.store.get_account(username)? else {
            verify_secret(password, dummy_hash());
            tracing::warn!("Login attempt for unknown username");
            return Err(AppError::InvalidCredentials);
        };

        if account.is_locked(now) {
            tracing::warn!(username, "Login attempt on locked account");
            return Err(AppError::AccountLocked);
        }

        let verified_version = account.credential_version;
        if !verify_secret(password, &account.password_hash) {
            let updated = self.store.update_account(username, &mut |a| {
                // Another request may have locked it meanwhile.
                if a.is_locked(now) {
                    return Ok(());
                }
                a.login_attempts += 1;
                if a.login_attempts >= MAX_LOGIN_ATTEMPTS {
                    a.lock_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
                    a.login_attempts = 0;
                }
                a.updated_at = now;
                Ok(())
            })?;

            if updated.is_locked(now) {
                tracing::warn!(username, "Account locked after repeated login failures");
            } else {
                tracing::warn!(username, attempts = updated.login_attempts, "Login failed");
            }
            return Err(AppError::InvalidCredentials);
        }

        let account = self.store.update_account(username, &mut |a| {
            // Password changed while this one was being verified.
            if a.credential_version != verified_version {
                return Err(AppError::InvalidCredentials);
            }
            a.login_attempts = 0;
            a.lock_until = None;
            a.last_login = Some(now);
            a.updated_at = now;
            Ok(())
        })?;

        let lifetime = if remember_me {
            Duration::days(REMEMBER_ME_DAYS)
        } else {
            Duration::hours(SESSION_HOURS)
        };
        let session = AdminSession {
            id: generate_session_id(),
            username: account.username.clone(),
            issued_at: now,
            expires_at: now + lifetime,
            last_activity: now,
            is_active: true,
            remember_me,
            device,
        };
        self.store.insert_session(session.clone())?;

        // A reset that committed after the update above may have revoked
        // sessions before this one existed.
        let current_version = self
            .store
            .get_account(username)?
            .map(|a| a.credential_version);
        if current_version != Some(verified_version) {
            self.store.update_session(&session.id, &mut |s| {
                s.is_active = false;
                Ok(())
            })?;
            tracing::warn!(username, "Password changed during login, session revoked");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.sign(&Claims {
            sub: account.username.clone(),
            purpose: PURPOSE_SESSION.to_string(),
            sid: Some(session.id.clone()),
            ver: None,
            iat: now.timestamp(),
            exp: session.expires_at.timestamp(),
        })?;

        tracing::info!(username, remember_me, "Admin login successful");
        Ok(LoginOutcome {
            token,
            session,
            username: account.username,
            last_login: account.last_login,
        })
    }

    /// Resolve a session token. Any failure is `Unauthenticated`.
    pub fn verify_session(&self, token: &str) -> Result<AuthAdmin> {
        let claims = self
            .decode_claims(token)
            .map_err(|_| AppError::Unauthenticated)?;
        if claims.purpose != PURPOSE_SESSION {
            return Err(AppError::Unauthenticated);
        }
        let session_id = claims.sid.ok_or(AppError::Unauthenticated)?;

        let now = self.clock.now();
        let session = self
            .store
            .get_session(&session_id)?
            .ok_or(AppError::Unauthenticated)?;
        if !session.is_valid(now) || session.username != claims.sub {
            return Err(AppError::Unauthenticated);
        }

        self.store
            .touch_session(&session_id, now)
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::Unauthenticated,
                other => other,
            })?;

        Ok(AuthAdmin {
            username: session.username,
            session_id,
        })
    }

    /// End one session.
    pub fn logout(&self, session_id: &str) -> Result<()> {
        match self.store.update_session(session_id, &mut |s| {
            s.is_active = false;
            Ok(())
        }) {
            Ok(session) => {
                tracing::info!(username = %session.username, "Admin logged out");
                Ok(())
            }
            Err(AppError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // ─── Password recovery ───────────────────────────────────────

    /// Security questions for `username`, without revealing whether the
    /// account exists.
    pub fn forgot_password(&self, username: &str) -> Result<SecurityPrompt> {
        let Some(account) = self.store.get_account(username.trim())? else {
            return Ok(SecurityPrompt::empty());
        };
        if account.security_questions.is_empty() {
            return Ok(SecurityPrompt::empty());
        }

        Ok(SecurityPrompt {
            has_security_questions: true,
            security_questions: account
                .security_questions
                .into_iter()
                .map(|q| q.question)
                .collect(),
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
        })
    }

    /// Check every answer in order and issue a short-lived reset token.
    pub fn verify_security_answers(&self, username: &str, answers: &[String]) -> Result<String> {
        let username = username.trim();
        let Some(account) = self.store.get_account(username)? else {
            verify_secret("", dummy_hash());
            return Err(AppError::VerificationFailed);
        };

        let questions = &account.security_questions;
        if questions.is_empty() || answers.len() != questions.len() {
            tracing::warn!(username, "Security answer count mismatch");
            return Err(AppError::VerificationFailed);
        }

        // Verify all of them so a wrong first answer takes as long as a
        // wrong last one.
        let all_match = answers
            .iter()
            .zip(questions)
            .map(|(answer, q)| verify_secret(&normalize_answer(answer), &q.answer_hash))
            .fold(true, |acc, ok| acc & ok);
        if !all_match {
            tracing::warn!(username, "Security answers verification failed");
            return Err(AppError::VerificationFailed);
        }

        let now = self.clock.now();
        let token = self.sign(&Claims {
            sub: account.username.clone(),
            purpose: PURPOSE_RESET.to_string(),
            sid: None,
            ver: Some(account.credential_version),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(RESET_TOKEN_MINUTES)).timestamp(),
        })?;

        tracing::info!(username, "Security answers verified, reset token issued");
        Ok(token)
    }

    /// Replace the password using a reset token. Every existing session of
    /// the account is revoked and the token cannot be used again.
    pub fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<()> {
        validate_password(new_password)?;

        let claims = self
            .decode_claims(reset_token)
            .map_err(|_| AppError::TokenInvalid)?;
        if claims.purpose != PURPOSE_RESET {
            return Err(AppError::TokenInvalid);
        }
        let now = self.clock.now();
        if now.timestamp() >= claims.exp {
            return Err(AppError::TokenExpired);
        }
        let version = claims.ver.ok_or(AppError::TokenInvalid)?;

        let password_hash = hash_secret(new_password)?;
        self.store
            .update_account(&claims.sub, &mut |a| {
                if a.credential_version != version {
                    return Err(AppError::TokenInvalid);
                }
                a.password_hash = password_hash.clone();
                a.credential_version += 1;
                a.login_attempts = 0;
                a.lock_until = None;
                a.updated_at = now;
                Ok(())
            })
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::TokenInvalid,
                other => other,
            })?;

        let revoked = self.store.deactivate_sessions(&claims.sub)?;
        tracing::info!(username = %claims.sub, revoked, "Password reset, sessions revoked");
        Ok(())
    }

    // ─── Tokens ──────────────────────────────────────────────────

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Check the signature only; expiry is judged against our clock.
    fn decode_claims(&self, token: &str) -> std::result::Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.signing_key),
            &validation,
        )?;
        Ok(data.claims)
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Hash a password or answer with Argon2id.
fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

fn verify_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

/// Hash verified for unknown usernames.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_secret("unknown-user-placeholder").unwrap_or_default())
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
