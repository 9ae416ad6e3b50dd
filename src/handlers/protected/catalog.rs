// handlers/protected/catalog.rs - /api/catalog/:resource[/:id]
//
// Reads are open to every authenticated user. Writes are checked against
// the caller's add/edit/delete permissions by the catalog service.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::CatalogItem;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::CatalogInput;
use crate::types::Resource;

fn parse_resource(raw: &str) -> Result<Resource, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Unknown catalog resource '{}'", raw)))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid id '{}'", raw)))
}

/// GET /api/catalog/:resource
pub async fn list_get(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> ApiResult<Vec<CatalogItem>> {
    let resource = parse_resource(&resource)?;
    let items = state.catalog_service().list(resource).await?;
    Ok(ApiResponse::success(items))
}

/// POST /api/catalog/:resource
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(resource): Path<String>,
    payload: Result<Json<CatalogInput>, JsonRejection>,
) -> ApiResult<CatalogItem> {
    let resource = parse_resource(&resource)?;
    let Json(input) = payload?;
    let item = state.catalog_service().create(user.view(), resource, input).await?;
    Ok(ApiResponse::created(item))
}

/// GET /api/catalog/:resource/:id
pub async fn item_get(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<CatalogItem> {
    let resource = parse_resource(&resource)?;
    let id = parse_id(&id)?;
    let item = state.catalog_service().get(resource, id).await?;
    Ok(ApiResponse::success(item))
}

/// PUT /api/catalog/:resource/:id
pub async fn item_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((resource, id)): Path<(String, String)>,
    payload: Result<Json<CatalogInput>, JsonRejection>,
) -> ApiResult<CatalogItem> {
    let resource = parse_resource(&resource)?;
    let id = parse_id(&id)?;
    let Json(input) = payload?;
    let item = state
        .catalog_service()
        .update(user.view(), resource, id, input)
        .await?;
    Ok(ApiResponse::success(item))
}

/// DELETE /api/catalog/:resource/:id
pub async fn item_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let resource = parse_resource(&resource)?;
    let id = parse_id(&id)?;
    state.catalog_service().delete(user.view(), resource, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
