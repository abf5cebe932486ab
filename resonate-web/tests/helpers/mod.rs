//! Shared helpers for the HTTP integration tests
//!
//! Each test gets a private in-memory database and a router built with
//! cheap argon2 costs.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use resonate_common::db::{init_memory_database, UserId};
use resonate_web::db::{sessions, users};
use resonate_web::{build_router, AppState, PasswordHasher};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

pub const PASSWORD: &str = "upright-groove-7";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub async fn test_app() -> TestApp {
    test_app_with(false).await
}

pub async fn test_app_with(secure_cookies: bool) -> TestApp {
    build_test_app(24, secure_cookies).await
}

pub async fn build_test_app(session_ttl_hours: i64, secure_cookies: bool) -> TestApp {
    let db = init_memory_database().await.expect("in-memory database");
    let hasher = PasswordHasher::with_costs(8, 1).expect("argon2 params");
    let state = AppState::new(db, session_ttl_hours, secure_cookies).with_hasher(hasher);
    let router = build_router(state.clone());
    TestApp { state, router }
}

impl TestApp {
    /// Send a request; `token` is sent as the session cookie
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("resonate_session={}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response<Body> {
        self.send("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Response<Body> {
        self.send("POST", uri, Some(token), Some(body)).await
    }

    /// Create a user straight in the store and open a session for them
    pub async fn user(&self, username: &str) -> (UserId, String) {
        let password_hash = self.state.hasher.hash(PASSWORD).unwrap();
        let user = users::create_user(
            &self.state.db,
            &users::NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash,
            },
        )
        .await
        .unwrap();
        let token = sessions::create_session(&self.state.db, user.id, chrono::Duration::hours(1))
            .await
            .unwrap();
        (user.id, token)
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

/// Assert a 303 and return its target
pub fn redirect_target(response: &Response<Body>) -> String {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

pub fn set_cookie(response: &Response<Body>) -> String {
    response.headers()[header::SET_COOKIE].to_str().unwrap().to_string()
}

/// Session token carried by a `Set-Cookie` header
pub fn session_token(response: &Response<Body>) -> String {
    let cookie = set_cookie(response);
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.trim().strip_prefix("resonate_session="))
        .expect("session cookie")
        .to_string()
}
