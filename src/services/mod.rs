pub mod admin_service;
pub mod assistant_service;
pub mod auth_service;
pub mod chat_service;
pub mod project_service;

use thiserror::Error;

use crate::ai::AiError;
use crate::auth::AuthError;
use crate::context::ContextError;
use crate::database::repositories::ProjectRepository;
use crate::database::DatabaseError;
use crate::governor::AdmissionDenied;
use crate::middleware::AuthUser;
use crate::validators::ValidationError;

pub use admin_service::{AdminService, SystemStatus, ToggleRequest, UploadContextRequest};
pub use assistant_service::{
    AdvisorNoteRequest, AssistantService, ContextCheck, ConversationTurn, RegenerateRequest, SendMessageRequest,
};
pub use auth_service::{AuthService, LoginRequest, LoginResponse, RegisterUserRequest, UpdateUserRequest};
pub use chat_service::{ChatService, CreateChatRequest};
pub use project_service::{CreateProjectRequest, ProjectService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Admission(#[from] AdmissionDenied),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Admins reach every project; everyone else only the ones they belong to.
pub(crate) async fn ensure_project_access(
    projects: &ProjectRepository,
    user: &AuthUser,
    project_id: i64,
) -> Result<(), ServiceError> {
    if user.is_admin() || projects.is_member(project_id, user.user_id).await? {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "No access to project {}",
            project_id
        )))
    }
}
