#![allow(dead_code)]

use std::sync::Arc;

use ai_locker::config::AppConfig;
use ai_locker::database::Stores;
use ai_locker::{app, AppState};
use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SEED_EMAIL: &str = "seed@example.com";
pub const PASSWORD: &str = "password123";

pub fn test_state() -> AppState {
    AppState::new(Arc::new(AppConfig::for_tests(SEED_EMAIL)), Stores::memory())
}

pub fn test_app() -> Router {
    app(test_state())
}

/// Sends one request through the router and returns status plus JSON body.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, value)
}

/// Creates an account and returns its token and id.
pub async fn signup(app: &Router, name: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
    let token = body["data"]["token"].as_str().expect("token").to_string();
    let id = body["data"]["user"]["id"].as_str().expect("id").to_string();
    (token, id)
}

pub struct TestServer {
    pub base_url: String,
}

/// Serves a fresh in-memory app on a free local port.
pub async fn spawn_server() -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    let router = test_app();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
    })
}
