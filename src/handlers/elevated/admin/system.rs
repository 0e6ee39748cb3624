// handlers/elevated/admin/system.rs - kill switch, monthly reset and usage reports

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::governor::{PeriodStats, UsageReport};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{AdminService, SystemStatus, ToggleRequest};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

fn service(state: &AppState) -> AdminService {
    AdminService::new(state.pool.clone(), state.governor.clone(), state.contexts.clone())
}

/// GET /api/admin/system/status - governor, contexts and entity counts
pub async fn status_get(State(state): State<AppState>) -> ApiResult<SystemStatus> {
    Ok(ApiResponse::success(service(&state).system_status().await))
}

/**
 * POST /api/admin/system/toggle - Flip the kill switch
 *
 * Expected Input:
 * ```json
 * { "enable": false, "reason": "Exam week" }
 * ```
 *
 * `reason` is logged when disabling and defaults to "Scheduled maintenance".
 */
pub async fn toggle_post(
    State(state): State<AppState>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> ApiResult<UsageReport> {
    let Json(request) = payload?;
    let message = if request.enable { "System enabled" } else { "System disabled" };
    let report = service(&state).toggle(request).await;
    Ok(ApiResponse::success(report).with_message(message))
}

/// POST /api/admin/system/reset-monthly - zero the monthly counter
pub async fn reset_monthly_post(State(state): State<AppState>) -> ApiResult<UsageReport> {
    let report = service(&state).reset_monthly().await;
    Ok(ApiResponse::success(report).with_message("Monthly counter reset"))
}

/// GET /api/admin/system/stats - usage statistics (`days`, default 30)
pub async fn stats_get(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> ApiResult<PeriodStats> {
    Ok(ApiResponse::success(service(&state).stats(query.days).await))
}
