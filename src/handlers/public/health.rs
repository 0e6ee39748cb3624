// handlers/public/health.rs - GET / and GET /health

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::DatabaseManager;

/// GET / - service information
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "APBIA API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Project assistant for Bragantec participants",
            "endpoints": {
                "health": "/health (public)",
                "login": "/api/auth/login (public)",
                "auth": "/api/auth/* (protected)",
                "projects": "/api/projects[/:id] (protected)",
                "chats": "/api/chats[/:id] (protected)",
                "assistant": "/api/assistant/* (protected)",
                "admin": "/api/admin/* (admin only)"
            }
        }
    }))
}

/// GET /health - database ping; 503 when degraded
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
