// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::BoxFuture;
use rk_loyalty::config::Config;
use rk_loyalty::db::MemoryStore;
use rk_loyalty::routes::create_router;
use rk_loyalty::services::{Delivery, Destination, Notifier, NotifyError, QuestionInput};
use rk_loyalty::time_utils::ManualClock;
use rk_loyalty::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[allow(dead_code)]
pub const ADMIN_USERNAME: &str = "rkadmin";
#[allow(dead_code)]
pub const ADMIN_PASSWORD: &str = "dragon-fire-2025";
#[allow(dead_code)]
pub const ANSWERS: [&str; 3] = ["Pune", "Tiger", "Golgappa"];

/// Fixed start time for every test clock.
#[allow(dead_code)]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap()
}

/// Notifier that records every message instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Destination, String)>>,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl RecordingNotifier {
    /// Make every following send fail (after recording it).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Destination, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(
        &'a self,
        destination: &'a Destination,
        message: &'a str,
    ) -> BoxFuture<'a, Result<Delivery, NotifyError>> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap()
                .push((destination.clone(), message.to_string()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::Rejected("provider down".to_string()));
            }
            Ok(Delivery {
                provider_id: Some("test-msg".to_string()),
                simulated: false,
            })
        })
    }
}

/// Everything a test needs to drive and inspect the app.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

/// Create a test app with an in-memory store and a manual clock.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default(), MemoryStore::new())
}

/// Create a test app around a given config and store.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config, store: MemoryStore) -> TestApp {
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new(start_time()));
    let notifier = Arc::new(RecordingNotifier::default());

    let state = Arc::new(AppState::new(
        config,
        store.clone(),
        notifier.clone(),
        clock.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        clock,
        notifier,
    }
}

#[allow(dead_code)]
pub fn questions() -> Vec<QuestionInput> {
    ["City of birth?", "First pet?", "Favourite snack?"]
        .iter()
        .zip(ANSWERS)
        .map(|(q, a)| QuestionInput {
            question: q.to_string(),
            answer: a.to_string(),
        })
        .collect()
}

/// Create the admin account directly through the service.
#[allow(dead_code)]
pub fn setup_admin(app: &TestApp) {
    app.state
        .admin
        .setup(ADMIN_USERNAME, ADMIN_PASSWORD, &questions())
        .expect("admin setup failed");
}

/// Build a JSON request.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as text.
#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The `name=value` part of a Set-Cookie header.
#[allow(dead_code)]
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("rk_admin_token="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Log in over HTTP and return the `Cookie` header value.
#[allow(dead_code)]
pub async fn login_cookie(app: &TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            serde_json::json!({"username": ADMIN_USERNAME, "password": ADMIN_PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).expect("login did not set a session cookie")
}

/// Send a request carrying the session cookie.
#[allow(dead_code)]
pub async fn send_authed(app: &TestApp, cookie: &str, mut request: Request<Body>) -> Response {
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    app.router.clone().oneshot(request).await.unwrap()
}
