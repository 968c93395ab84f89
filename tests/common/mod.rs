#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use todo_api::auth::TokenCodec;
use todo_api::config::AppConfig;
use todo_api::database::MemoryStore;
use todo_api::AppState;

pub const TEST_SECRET: &str = "integration-access-secret";

const TEST_CONFIG: &str = r#"
dev: true
db:
  user: postgres
  database: todo_app_test
jwt:
  secret: integration-access-secret
"#;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Full router over an empty in-memory store.
    pub fn spawn() -> Self {
        let config = AppConfig::from_yaml(TEST_CONFIG).expect("test config parses");
        let codec = TokenCodec::new(&config.jwt).expect("test secret is set");
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, codec, store.clone(), store.clone());

        Self {
            router: todo_api::app(state),
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let (status, bytes) = self.send_raw(request).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn send_raw(&self, request: Request<Body>) -> Result<(StatusCode, Vec<u8>)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, bytes.to_vec()))
    }

    pub async fn post(&self, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(post_json(uri, &body)).await
    }

    /// Register a user and return (access_token, refresh_token).
    pub async fn register(&self, username: &str, password: &str) -> Result<(String, String)> {
        let (status, body) = self
            .post(
                "/api/auth/register",
                serde_json::json!({ "username": username, "password": password }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "register failed: {} {}", status, body);
        Ok(tokens(&body))
    }
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn get_with_auth(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).expect("valid request")
}

pub fn tokens(body: &Value) -> (String, String) {
    let access = body["data"]["access_token"].as_str().unwrap_or_default().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap_or_default().to_string();
    (access, refresh)
}
