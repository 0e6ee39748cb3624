// handlers/public/auth.rs - POST /api/auth/login handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AuthService, LoginRequest, LoginResponse};

/**
 * POST /api/auth/login - Authenticate and receive a JWT
 *
 * Expected Input:
 * ```json
 * { "email": "ana@ifsp.edu.br", "password": "Segura123", "bp": "BRG12345678" }
 * ```
 *
 * `bp` is required for participants only. The response carries the token,
 * its lifetime in seconds and the user profile.
 */
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;
    let service = AuthService::new(state.pool.clone(), state.config.clone());
    let response = service.login(request).await?;
    Ok(ApiResponse::success(response).with_message("Login successful"))
}
