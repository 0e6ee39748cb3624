// handlers/protected/auth.rs - token validation and password change

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::AuthService;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/auth/validate - token is valid and its user still exists
pub async fn validate_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<User> {
    let service = AuthService::new(state.pool.clone(), state.config.clone());
    let user = service.current_user(auth.user_id).await?;
    Ok(ApiResponse::success(user).with_message("Token is valid"))
}

/// POST /api/auth/password - change own password
pub async fn password_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(request) = payload?;
    let service = AuthService::new(state.pool.clone(), state.config.clone());
    service
        .change_password(auth.user_id, &request.current_password, &request.new_password)
        .await?;
    Ok(ApiResponse::success(()).with_message("Password changed"))
}
