// handlers/elevated/admin/contexts.rs - context file management

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::app::AppState;
use crate::context::UploadReceipt;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::admin_service::{ContextFile, ReloadSummary};
use crate::services::{AdminService, UploadContextRequest};
use crate::storage::ObjectInfo;

fn service(state: &AppState) -> AdminService {
    AdminService::new(state.pool.clone(), state.governor.clone(), state.contexts.clone())
}

/// GET /api/admin/contexts - text files in the context bucket
pub async fn contexts_get(State(state): State<AppState>) -> ApiResult<Vec<ObjectInfo>> {
    Ok(ApiResponse::success(service(&state).list_contexts().await?))
}

/// POST /api/admin/contexts - upload `{ "name", "content" }` as UTF-8 text
pub async fn contexts_post(
    State(state): State<AppState>,
    payload: Result<Json<UploadContextRequest>, JsonRejection>,
) -> ApiResult<UploadReceipt> {
    let Json(request) = payload?;
    let receipt = service(&state).upload_context(request).await?;
    Ok(ApiResponse::created(receipt).with_message("Context file uploaded"))
}

/// POST /api/admin/contexts/reload - drop the cache and load everything again
pub async fn reload_post(State(state): State<AppState>) -> ApiResult<ReloadSummary> {
    let summary = service(&state).reload_contexts().await?;
    Ok(ApiResponse::success(summary).with_message("Contexts reloaded"))
}

/// GET /api/admin/contexts/:name - one context file, decoded
pub async fn context_get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<ContextFile> {
    Ok(ApiResponse::success(service(&state).read_context(&name).await?))
}

/// DELETE /api/admin/contexts/:name - remove a context file (`/` sent as `%2F`)
pub async fn context_delete(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<()> {
    service(&state).delete_context(&name).await?;
    Ok(ApiResponse::success(()).with_message("Context file deleted"))
}
