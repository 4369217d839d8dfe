// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Administrator account lifecycle.
//!
//! These tests verify that:
//! 1. Setup happens exactly once
//! 2. Five failed logins lock the account for 30 minutes
//! 3. Sessions expire on the injected clock and end at logout
//! 4. Password recovery issues single-use reset tokens and revokes sessions

use chrono::Duration;
use common::{ADMIN_PASSWORD, ADMIN_USERNAME, ANSWERS};
use rk_loyalty::error::AppError;
use rk_loyalty::models::DeviceInfo;

mod common;

fn answers() -> Vec<String> {
    ANSWERS.iter().map(|a| a.to_string()).collect()
}

#[test]
fn test_setup_only_once() {
    let app = common::create_test_app();
    assert!(!app.state.admin.setup_status().unwrap());

    common::setup_admin(&app);
    assert!(app.state.admin.setup_status().unwrap());

    let err = app
        .state
        .admin
        .setup("intruder", "another-password", &common::questions())
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadySetup));
}

#[test]
fn test_setup_validates_input() {
    let app = common::create_test_app();
    let admin = &app.state.admin;

    assert!(matches!(
        admin.setup(ADMIN_USERNAME, "short", &common::questions()),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        admin.setup(ADMIN_USERNAME, ADMIN_PASSWORD, &common::questions()[..2]),
        Err(AppError::Validation(_))
    ));
    assert!(!admin.setup_status().unwrap());
}

#[test]
fn test_setup_stores_only_hashes() {
    let app = common::create_test_app();
    common::setup_admin(&app);

    use rk_loyalty::db::Store;
    let account = app.store.get_account(ADMIN_USERNAME).unwrap().unwrap();
    assert!(account.password_hash.starts_with("$argon2id$"));
    assert_ne!(account.password_hash, ADMIN_PASSWORD);
    for q in &account.security_questions {
        assert!(q.answer_hash.starts_with("$argon2id$"));
    }
}

#[test]
fn test_login_and_verify_session() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let outcome = admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default())
        .unwrap();
    assert_eq!(outcome.username, ADMIN_USERNAME);
    assert_eq!(outcome.last_login, Some(common::start_time()));
    assert_eq!(outcome.lifetime(), Duration::hours(24));

    let auth = admin.verify_session(&outcome.token).unwrap();
    assert_eq!(auth.username, ADMIN_USERNAME);
    assert_eq!(auth.session_id, outcome.session.id);

    // Activity does not extend the session.
    app.clock.advance(Duration::hours(23));
    admin.verify_session(&outcome.token).unwrap();
    app.clock.advance(Duration::hours(1));
    assert!(matches!(
        admin.verify_session(&outcome.token),
        Err(AppError::Unauthenticated)
    ));
}

#[test]
fn test_remember_me_lasts_thirty_days() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let outcome = admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, true, DeviceInfo::default())
        .unwrap();
    assert_eq!(outcome.lifetime(), Duration::days(30));

    app.clock.advance(Duration::days(29));
    admin.verify_session(&outcome.token).unwrap();
    app.clock.advance(Duration::days(1));
    assert!(admin.verify_session(&outcome.token).is_err());
}

#[test]
fn test_unknown_user_and_wrong_password_look_the_same() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let unknown = admin
        .login("nobody", ADMIN_PASSWORD, false, DeviceInfo::default())
        .unwrap_err();
    let wrong = admin
        .login(ADMIN_USERNAME, "not-the-password", false, DeviceInfo::default())
        .unwrap_err();
    assert!(matches!(unknown, AppError::InvalidCredentials));
    assert!(matches!(wrong, AppError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[test]
fn test_five_failures_lock_account_for_thirty_minutes() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    for _ in 0..5 {
        let err = admin
            .login(ADMIN_USERNAME, "wrong-password", false, DeviceInfo::default())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    // The right password is refused while locked.
    let err = admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default())
        .unwrap_err();
    assert!(matches!(err, AppError::AccountLocked));

    app.clock.advance(Duration::minutes(29));
    assert!(matches!(
        admin.login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default()),
        Err(AppError::AccountLocked)
    ));

    app.clock.advance(Duration::minutes(1));
    admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default())
        .unwrap();
}

#[test]
fn test_counter_restarts_after_lockout() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    for _ in 0..5 {
        let _ = admin.login(ADMIN_USERNAME, "wrong-password", false, DeviceInfo::default());
    }
    app.clock.advance(Duration::minutes(31));

    // A single failure after expiry does not re-lock.
    let err = admin
        .login(ADMIN_USERNAME, "wrong-password", false, DeviceInfo::default())
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
    admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default())
        .unwrap();
}

#[test]
fn test_logout_ends_only_that_session() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let phone = admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default())
        .unwrap();
    let laptop = admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, true, DeviceInfo::default())
        .unwrap();

    admin.logout(&phone.session.id).unwrap();
    assert!(admin.verify_session(&phone.token).is_err());
    admin.verify_session(&laptop.token).unwrap();
}

#[test]
fn test_forgot_password_does_not_reveal_accounts() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let known = admin.forgot_password(ADMIN_USERNAME).unwrap();
    assert!(known.has_security_questions);
    assert_eq!(known.security_questions.len(), 3);

    let unknown = admin.forgot_password("nobody").unwrap();
    assert!(!unknown.has_security_questions);
    assert!(unknown.security_questions.is_empty());
    assert_eq!(unknown.message, known.message);
}

#[test]
fn test_password_reset_revokes_sessions_and_is_single_use() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let session = admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, true, DeviceInfo::default())
        .unwrap();

    // Answers are compared case- and whitespace-insensitively.
    let spoken = vec![
        "  pune ".to_string(),
        "TIGER".to_string(),
        "golgappa".to_string(),
    ];
    let token = admin.verify_security_answers(ADMIN_USERNAME, &spoken).unwrap();

    admin.reset_password(&token, "brand-new-secret").unwrap();

    assert!(admin.verify_session(&session.token).is_err());
    assert!(matches!(
        admin.login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default()),
        Err(AppError::InvalidCredentials)
    ));
    admin
        .login(ADMIN_USERNAME, "brand-new-secret", false, DeviceInfo::default())
        .unwrap();

    let reused = admin.reset_password(&token, "yet-another-secret").unwrap_err();
    assert!(matches!(reused, AppError::TokenInvalid));
}

#[test]
fn test_reset_password_clears_lockout() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    for _ in 0..5 {
        let _ = admin.login(ADMIN_USERNAME, "wrong-password", false, DeviceInfo::default());
    }
    let token = admin
        .verify_security_answers(ADMIN_USERNAME, &answers())
        .unwrap();
    admin.reset_password(&token, "brand-new-secret").unwrap();

    admin
        .login(ADMIN_USERNAME, "brand-new-secret", false, DeviceInfo::default())
        .unwrap();
}

#[test]
fn test_reset_token_expires_after_fifteen_minutes() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let token = admin
        .verify_security_answers(ADMIN_USERNAME, &answers())
        .unwrap();
    app.clock.advance(Duration::minutes(15));

    let err = admin.reset_password(&token, "brand-new-secret").unwrap_err();
    assert!(matches!(err, AppError::TokenExpired));
}

#[test]
fn test_security_answers_must_all_match() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let wrong = vec!["Pune".to_string(), "Lion".to_string(), "Golgappa".to_string()];
    assert!(matches!(
        admin.verify_security_answers(ADMIN_USERNAME, &wrong),
        Err(AppError::VerificationFailed)
    ));

    let too_few = vec!["Pune".to_string(), "Tiger".to_string()];
    assert!(matches!(
        admin.verify_security_answers(ADMIN_USERNAME, &too_few),
        Err(AppError::VerificationFailed)
    ));

    assert!(matches!(
        admin.verify_security_answers("nobody", &answers()),
        Err(AppError::VerificationFailed)
    ));
}

#[test]
fn test_session_token_cannot_reset_password() {
    let app = common::create_test_app();
    common::setup_admin(&app);
    let admin = &app.state.admin;

    let session = admin
        .login(ADMIN_USERNAME, ADMIN_PASSWORD, false, DeviceInfo::default())
        .unwrap();
    let err = admin
        .reset_password(&session.token, "brand-new-secret")
        .unwrap_err();
    assert!(matches!(err, AppError::TokenInvalid));

    let reset = admin
        .verify_security_answers(ADMIN_USERNAME, &answers())
        .unwrap();
    assert!(matches!(
        admin.verify_session(&reset),
        Err(AppError::Unauthenticated)
    ));
}
