use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::UserView;

/// GET /api/auth/me - the caller as currently stored, with `is_seed`.
pub async fn me_get(Extension(user): Extension<AuthUser>) -> ApiResult<UserView> {
    Ok(ApiResponse::success(user.0))
}
