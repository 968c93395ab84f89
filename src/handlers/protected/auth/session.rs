use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

/// GET /api/auth/check-token - Identity carried by the caller's access token
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "message": "success",
///   "data": {
///     "username": "alice",
///     "sub": 1,
///     "iat": 1700000000,
///     "exp": 1700086400,
///     "is_anonymous": false
///   }
/// }
/// ```
pub async fn check_token(Extension(user): Extension<CurrentUser>) -> ApiResult<CurrentUser> {
    Ok(ApiResponse::success(user))
}
