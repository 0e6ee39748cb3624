// handlers/protected/assistant.rs - questions to the assistant and its status

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::Message;
use crate::governor::UsageReport;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{
    AdvisorNoteRequest, AssistantService, ContextCheck, ConversationTurn, RegenerateRequest, SendMessageRequest,
};

fn service(state: &AppState) -> AssistantService {
    AssistantService::new(
        state.pool.clone(),
        state.governor.clone(),
        state.contexts.clone(),
        state.assistant.clone(),
    )
}

/**
 * POST /api/assistant/messages - Ask the assistant
 *
 * Expected Input:
 * ```json
 * { "chat_id": 3, "content": "Como escrevo a metodologia?", "mode": "standard" }
 * ```
 *
 * `mode` is `standard` (default, uses chat history) or `thinking`. An optional
 * `edition_year` restricts the reference texts to that fair edition.
 * Refused with 503 while the system is disabled and 429 when the per-minute
 * limit is reached. The response holds both stored messages and the usage
 * report after recording the call.
 */
pub async fn messages_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<ConversationTurn> {
    let Json(request) = payload?;
    let turn = service(&state).send_message(&auth, request).await?;
    Ok(ApiResponse::created(turn).with_message("Answer generated"))
}

/// POST /api/assistant/regenerate - new answer for an earlier student message
pub async fn regenerate_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<RegenerateRequest>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(request) = payload?;
    let message = service(&state).regenerate(&auth, request).await?;
    Ok(ApiResponse::created(message).with_message("Answer regenerated"))
}

/// POST /api/assistant/notes - advisor note on an assistant answer
pub async fn notes_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<AdvisorNoteRequest>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(request) = payload?;
    let note = service(&state).add_note(&auth, request).await?;
    Ok(ApiResponse::created(note).with_message("Note added"))
}

/// GET /api/assistant/status - usage governor report
pub async fn status_get(State(state): State<AppState>) -> ApiResult<UsageReport> {
    Ok(ApiResponse::success(service(&state).status().await))
}

/// GET /api/assistant/contexts/check - context bucket diagnostics
pub async fn contexts_check_get(State(state): State<AppState>) -> ApiResult<ContextCheck> {
    Ok(ApiResponse::success(service(&state).check_contexts().await))
}
