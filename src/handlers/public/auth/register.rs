// handlers/public/auth/register.rs - POST /api/auth/register handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::auth::TokenPair;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/register - Create an account and receive a token pair
///
/// Expected Input:
/// ```json
/// { "username": "alice", "password": "pw123" }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "message": "success",
///   "data": { "access_token": "eyJ...", "refresh_token": "eyJ..." }
/// }
/// ```
///
/// 400 when a field is empty or the username is taken.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<TokenPair> {
    let Json(payload) = payload?;
    let pair = state.sessions.register(&payload.username, &payload.password).await?;
    Ok(ApiResponse::success(pair))
}
