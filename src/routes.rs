use std::time::Duration;

use axum::{
    extract::State,
    http::{header, Method},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::ApiError;
use crate::handlers;
use crate::middleware::require_access_token;
use crate::state::AppState;

/// Full application router with global middleware applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/ping", get(ping))
        // Public auth routes
        .merge(auth_public_routes())
        // Protected auth routes
        .merge(auth_routes(state.clone()))
        .fallback(not_found)
        // Global middleware
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh-token", post(auth::refresh_token))
}

fn auth_routes(state: AppState) -> Router<AppState> {
    use handlers::protected::auth;

    Router::new()
        .route("/api/auth/check-token", get(auth::check_token))
        .route_layer(middleware::from_fn_with_state(state, require_access_token))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(300))
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Todo API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "endpoints": {
                "register": "POST /api/auth/register (public)",
                "login": "POST /api/auth/login (public)",
                "refresh": "POST /api/auth/refresh-token (public)",
                "check_token": "GET /api/auth/check-token (bearer access token)",
                "health": "GET /health (public)",
                "ping": "GET /api/ping (public)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.sessions.health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("database unavailable")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "database": "ok"
        }
    })))
}

/// Plain-text liveness check.
async fn ping() -> &'static str {
    "pong"
}

async fn not_found() -> ApiError {
    ApiError::not_found("The requested resource could not be found.")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::auth::TokenCodec;
    use crate::config::AppConfig;
    use crate::database::models::Session;
    use crate::database::{MemoryStore, SessionStore, StoreError};

    /// Session store whose backing database is unreachable.
    struct DownStore;

    #[async_trait]
    impl SessionStore for DownStore {
        async fn save_session(&self, _: i64, _: &str, _: &str) -> Result<Session, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn rotate_session(&self, _: i64, _: &str, _: &str, _: &str) -> Result<Option<Session>, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }
    }

    fn app_with(sessions: Arc<dyn SessionStore>) -> Router {
        let config = AppConfig::from_yaml("db: {user: u, database: d}\njwt: {secret: routes-secret}\n").unwrap();
        let codec = TokenCodec::new(&config.jwt).unwrap();
        app(AppState::new(config, codec, Arc::new(MemoryStore::new()), sessions))
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_health_reports_unavailable_store() {
        let (status, body) = fetch(app_with(Arc::new(DownStore)), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(body["error"], "database unavailable");
    }

    #[tokio::test]
    async fn test_ping_answers_pong() {
        let (status, body) = fetch(app_with(Arc::new(DownStore)), "/api/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"pong");
    }
}
