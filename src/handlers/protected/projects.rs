// handlers/protected/projects.rs - project listing and detail

use axum::{
    extract::{Path, State},
    Extension,
};

use crate::app::AppState;
use crate::database::models::{ChatSummary, Project, ProjectDetail};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ChatService, ProjectService};

/// GET /api/projects - all projects for admins, own projects otherwise
pub async fn projects_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<Project>> {
    let service = ProjectService::new(state.pool.clone());
    Ok(ApiResponse::success(service.list_for(&auth).await?))
}

/// GET /api/projects/:id - project with participants and advisors
pub async fn project_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<ProjectDetail> {
    let service = ProjectService::new(state.pool.clone());
    Ok(ApiResponse::success(service.detail(&auth, id).await?))
}

/// GET /api/projects/:id/chats - chats of a project with message counts
pub async fn project_chats_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<ChatSummary>> {
    let service = ChatService::new(state.pool.clone());
    Ok(ApiResponse::success(service.list_for_project(&auth, id).await?))
}
