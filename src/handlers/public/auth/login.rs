// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::register::CredentialsRequest;
use crate::auth::TokenPair;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// POST /api/auth/login - Authenticate and receive a fresh token pair
///
/// Same body and response shape as register. The user's stored session is
/// replaced, so tokens from an earlier login stop refreshing.
///
/// Errors:
/// - 400 Bad Request: empty username or password
/// - 403 Forbidden: unknown user or wrong password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<TokenPair> {
    let Json(payload) = payload?;
    let pair = state.sessions.login(&payload.username, &payload.password).await?;
    Ok(ApiResponse::success(pair))
}
