// handlers/protected/chats.rs - chat CRUD, messages and advisor notes

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{AssistantKind, Chat, ChatDetail, Message};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ChatService, CreateChatRequest};

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub include_messages: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RenameChatRequest {
    pub title: String,
}

/**
 * POST /api/chats - Open a chat inside a project
 *
 * Expected Input:
 * ```json
 * { "project_id": 12, "assistant": "apbia", "title": "Metodologia" }
 * ```
 *
 * `assistant` defaults to `apbia`; an empty or missing title becomes
 * `Chat - <project name>`.
 */
pub async fn chats_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateChatRequest>, JsonRejection>,
) -> ApiResult<Chat> {
    let Json(request) = payload?;
    let service = ChatService::new(state.pool.clone());
    let chat = service.create(&auth, request).await?;
    Ok(ApiResponse::created(chat).with_message("Chat created"))
}

/// GET /api/chats/assistants - assistant kinds a chat can use
pub async fn assistants_get(State(state): State<AppState>) -> ApiResult<Vec<AssistantKind>> {
    let service = ChatService::new(state.pool.clone());
    Ok(ApiResponse::success(service.assistant_kinds().await?))
}

/// GET /api/chats/:id - chat, with messages unless `include_messages=false`
pub async fn chat_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(query): Query<ChatQuery>,
) -> ApiResult<ChatDetail> {
    let service = ChatService::new(state.pool.clone());
    let detail = service
        .detail(&auth, id, query.include_messages.unwrap_or(true))
        .await?;
    Ok(ApiResponse::success(detail))
}

/// PATCH /api/chats/:id - rename
pub async fn chat_patch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    payload: Result<Json<RenameChatRequest>, JsonRejection>,
) -> ApiResult<Chat> {
    let Json(request) = payload?;
    let service = ChatService::new(state.pool.clone());
    Ok(ApiResponse::success(service.rename(&auth, id, &request.title).await?))
}

/// DELETE /api/chats/:id - delete the chat and its messages
pub async fn chat_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let service = ChatService::new(state.pool.clone());
    service.delete(&auth, id).await?;
    Ok(ApiResponse::success(()).with_message("Chat deleted"))
}

/// GET /api/chats/:id/messages
pub async fn chat_messages_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Vec<Message>> {
    let service = ChatService::new(state.pool.clone());
    Ok(ApiResponse::success(service.messages(&auth, id, query.limit).await?))
}

/// GET /api/chats/:id/notes - advisor notes only
pub async fn chat_notes_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<Message>> {
    let service = ChatService::new(state.pool.clone());
    Ok(ApiResponse::success(service.advisor_notes(&auth, id).await?))
}
