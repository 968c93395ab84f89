// handlers/public/auth/refresh.rs - POST /api/auth/refresh-token handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::auth::TokenPair;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// POST /api/auth/refresh-token - Trade a refresh token for a new pair
///
/// Expected Input:
/// ```json
/// { "refresh_token": "eyJ..." }
/// ```
///
/// The presented token is consumed: a second call with the same value
/// returns 401.
pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> ApiResult<TokenPair> {
    let Json(payload) = payload?;
    let pair = state.sessions.refresh(&payload.refresh_token).await?;
    Ok(ApiResponse::success(pair))
}
