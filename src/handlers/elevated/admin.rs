// handlers/elevated/admin.rs - /api/admin/*
//
// Listing needs an admin; every mutation is reserved to the seed admin and
// enforced by the admin service.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::UserOrder;
use crate::error::ApiError;
use crate::handlers::optional_json;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::{PermissionFlags, UserView};

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    #[serde(rename = "orderBy", alias = "order_by")]
    pub order_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MakeAdminRequest {
    #[serde(default)]
    pub permissions: Option<PermissionFlags>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionsRequest {
    pub permissions: Option<PermissionFlags>,
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid user id '{}'", raw)))
}

/// GET /api/admin/users[?orderBy=name|-created_at|...]
pub async fn users_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UsersQuery>,
) -> ApiResult<Vec<UserView>> {
    let order = match query.order_by.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .parse::<UserOrder>()
            .map_err(|e| ApiError::validation_error(e, None))?,
        None => UserOrder::default(),
    };
    let users = state.admin_service().list_users(user.view(), order).await?;
    Ok(ApiResponse::success(users))
}

/// PUT /api/admin/make-admin/:id with optional `{permissions}`
pub async fn make_admin_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<UserView> {
    let id = parse_id(&id)?;
    let request: MakeAdminRequest = optional_json(&body)?.unwrap_or_default();
    let updated = state
        .admin_service()
        .make_admin(user.view(), id, request.permissions)
        .await?;
    Ok(ApiResponse::success(updated))
}

/// PUT /api/admin/revoke-admin/:id
pub async fn revoke_admin_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<UserView> {
    let id = parse_id(&id)?;
    let updated = state.admin_service().revoke_admin(user.view(), id).await?;
    Ok(ApiResponse::success(updated))
}

/// PUT /api/admin/permissions/:id with `{permissions: {add, edit, delete}}`
pub async fn permissions_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<UserView> {
    let id = parse_id(&id)?;
    let flags = optional_json::<PermissionsRequest>(&body)?
        .and_then(|r| r.permissions)
        .ok_or_else(|| {
            let mut fields = std::collections::HashMap::new();
            fields.insert("permissions".to_string(), "Permissions object is required".to_string());
            ApiError::validation_error("Validation failed", Some(fields))
        })?;
    let updated = state
        .admin_service()
        .update_permissions(user.view(), id, flags)
        .await?;
    Ok(ApiResponse::success(updated))
}
