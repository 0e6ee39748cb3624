// handlers/protected/users.rs - GET /api/users/me

use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::AuthService;

/// GET /api/users/me - own profile
pub async fn me_get(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<User> {
    let service = AuthService::new(state.pool.clone(), state.config.clone());
    Ok(ApiResponse::success(service.current_user(auth.user_id).await?))
}
