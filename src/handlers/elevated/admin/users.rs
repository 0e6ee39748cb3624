// handlers/elevated/admin/users.rs - user administration

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AuthService, RegisterUserRequest, UpdateUserRequest};

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

fn service(state: &AppState) -> AuthService {
    AuthService::new(state.pool.clone(), state.config.clone())
}

/// GET /api/admin/users - list users, optionally by role
pub async fn users_get(State(state): State<AppState>, Query(query): Query<UsersQuery>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(service(&state).list_users(query.role.as_deref()).await?))
}

/**
 * POST /api/admin/users - Register a user
 *
 * Expected Input:
 * ```json
 * { "name": "Ana Souza", "email": "ana@ifsp.edu.br", "password": "Segura123",
 *   "role": "participant", "bp": "BRG12345678" }
 * ```
 */
pub async fn users_post(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(request) = payload?;
    let user = service(&state).register(request).await?;
    Ok(ApiResponse::created(user).with_message("User registered"))
}

/// PATCH /api/admin/users/:id - update name, e-mail, BP, role or active flag
pub async fn user_patch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(request) = payload?;
    Ok(ApiResponse::success(service(&state).update_user(id, request).await?))
}

/// POST /api/admin/users/:id/password - reset a user's password
pub async fn user_password_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(request) = payload?;
    service(&state).reset_password(id, &request.new_password).await?;
    Ok(ApiResponse::success(()).with_message("Password reset"))
}
