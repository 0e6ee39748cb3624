// handlers/elevated/admin/projects.rs - project creation and membership

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::Role;
use crate::database::models::Project;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AuthService, CreateProjectRequest, ProjectService};

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub user_id: i64,
}

/// POST /api/admin/projects - create a project
pub async fn projects_post(
    State(state): State<AppState>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> ApiResult<Project> {
    let Json(request) = payload?;
    let project = ProjectService::new(state.pool.clone()).create(request).await?;
    Ok(ApiResponse::created(project).with_message("Project created"))
}

/// POST /api/admin/projects/:id/participants - link a participant
pub async fn participants_post(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    payload: Result<Json<MemberRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(request) = payload?;
    AuthService::new(state.pool.clone(), state.config.clone())
        .require_user_with_role(request.user_id, Role::Participant)
        .await?;
    ProjectService::new(state.pool.clone())
        .add_participant(project_id, request.user_id)
        .await?;
    Ok(ApiResponse::success(()).with_message("Participant linked"))
}

/// POST /api/admin/projects/:id/advisors - link an advisor
pub async fn advisors_post(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    payload: Result<Json<MemberRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(request) = payload?;
    AuthService::new(state.pool.clone(), state.config.clone())
        .require_user_with_role(request.user_id, Role::Advisor)
        .await?;
    ProjectService::new(state.pool.clone())
        .add_advisor(project_id, request.user_id)
        .await?;
    Ok(ApiResponse::success(()).with_message("Advisor linked"))
}
