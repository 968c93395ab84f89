use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::auth::TokenPayload;
use crate::error::ApiError;
use crate::state::AppState;

/// Identity of the caller, taken from a verified access token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub username: String,
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
    pub is_anonymous: bool,
}

impl From<TokenPayload> for CurrentUser {
    fn from(claims: TokenPayload) -> Self {
        Self {
            username: claims.username,
            sub: claims.sub,
            iat: claims.iat,
            exp: claims.exp,
            is_anonymous: claims.is_anonymous,
        }
    }
}

/// Rejects requests without a valid access token; otherwise makes the
/// caller's `CurrentUser` available to the handler. Session rows are not
/// consulted, so an access token stays usable until its own expiry.
pub async fn require_access_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).map_err(ApiError::unauthorized)?;

    let claims = state.codec.verify_access_token(token).map_err(|e| {
        tracing::debug!("access token rejected: {}", e);
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(CurrentUser::from(claims));

    Ok(next.run(request).await)
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers.get(AUTHORIZATION).ok_or("no token provided")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    if auth_str.trim().is_empty() {
        return Err("no token provided");
    }

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err("Empty JWT token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}
