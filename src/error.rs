// HTTP API Error Types
use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::ai::AiError;
use crate::auth::AuthError;
use crate::context::ContextError;
use crate::database::DatabaseError;
use crate::governor::AdmissionDenied;
use crate::services::ServiceError;
use crate::storage::StorageError;
use crate::validators::ValidationError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError { 
        message: String, 
        field_errors: Option<HashMap<String, String>> 
    },
    InvalidJson(String),
    
    // 401 Unauthorized  
    Unauthorized(String),
    
    // 403 Forbidden
    Forbidden(String),
    
    // 404 Not Found
    NotFound(String),
    
    // 409 Conflict
    Conflict(String),
    
    // 422 Unprocessable Entity (validation but semantically valid JSON)
    UnprocessableEntity { 
        message: String, 
        field_errors: HashMap<String, String> 
    },
    
    // 429 Too Many Requests
    TooManyRequests(String),
    
    // 500 Internal Server Error
    InternalServerError(String),
    
    // 502 Bad Gateway (external service issues)
    BadGateway(String),
    
    // 503 Service Unavailable  
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::TooManyRequests(_) => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }
    
    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }
    
    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });
                
                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }
                
                response
            }
            ApiError::UnprocessableEntity { message, field_errors } => {
                json!({
                    "error": true,
                    "message": message,
                    "code": "UNPROCESSABLE_ENTITY",
                    "field_errors": field_errors
                })
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }
    
    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED", 
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
    
    pub fn validation_error(
        message: impl Into<String>, 
        field_errors: Option<HashMap<String, String>>
    ) -> Self {
        ApiError::ValidationError { 
            message: message.into(), 
            field_errors 
        }
    }
    
    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }
    
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
    
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }
    
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
    
    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }
    
    pub fn unprocessable_entity(
        message: impl Into<String>, 
        field_errors: HashMap<String, String>
    ) -> Self {
        ApiError::UnprocessableEntity { 
            message: message.into(), 
            field_errors 
        }
    }
    
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }
    
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
    
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }
    
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(err.field.to_string(), err.message.clone());
        ApiError::validation_error(err.message, Some(field_errors))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => {
                tracing::debug!("Unique constraint violated: {}", msg);
                ApiError::conflict("A record with the same unique value already exists")
            }
            DatabaseError::ConnectionError(msg) => {
                tracing::error!("Database connection error: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::QueryError(msg) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database misconfigured: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken(msg) => ApiError::unauthorized(msg),
            AuthError::UnknownRole(role) => ApiError::bad_request(format!("Unknown role: {}", role)),
            AuthError::MissingSecret | AuthError::TokenGeneration(_) | AuthError::Hashing(_) => {
                tracing::error!("Authentication failure: {}", err);
                ApiError::internal_server_error("Authentication is not available")
            }
        }
    }
}

impl From<AdmissionDenied> for ApiError {
    fn from(err: AdmissionDenied) -> Self {
        match err {
            AdmissionDenied::SystemDisabled => ApiError::service_unavailable(
                "The assistant is temporarily disabled. Please try again later.",
            ),
            AdmissionDenied::PerMinuteLimit { .. } => ApiError::too_many_requests(format!(
                "Too many requests: {}. Please wait a moment.",
                err
            )),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Blocked(reason) => ApiError::unprocessable_entity(
                "The question was blocked by the content safety filter",
                HashMap::from([("content".to_string(), reason)]),
            ),
            other => {
                tracing::error!("Generative AI failure: {}", other);
                ApiError::bad_gateway("The assistant could not produce an answer")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => ApiError::not_found(format!("File not found: {}", path)),
            other => {
                tracing::error!("Object storage failure: {}", other);
                ApiError::bad_gateway("Object storage is unavailable")
            }
        }
    }
}

impl From<ContextError> for ApiError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::NotFound(name) => ApiError::not_found(format!("Context file not found: {}", name)),
            ContextError::InvalidName(name) => {
                ApiError::bad_request(format!("Invalid context file name: {}", name))
            }
            ContextError::Decode { name, source } => ApiError::unprocessable_entity(
                format!("Context file {} is not readable text", name),
                HashMap::from([("content".to_string(), source.to_string())]),
            ),
            ContextError::Storage(storage) => storage.into(),
            other => {
                tracing::error!("Context cache failure: {}", other);
                ApiError::bad_gateway("Context files are unavailable")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::Unauthorized(msg) => ApiError::unauthorized(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Validation(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::Auth(e) => e.into(),
            ServiceError::Admission(e) => e.into(),
            ServiceError::Ai(e) => e.into(),
            ServiceError::Context(e) => e.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_denials_map_to_503_and_429() {
        let disabled = ApiError::from(AdmissionDenied::SystemDisabled);
        assert_eq!(disabled.status_code(), 503);
        assert_eq!(disabled.error_code(), "SERVICE_UNAVAILABLE");

        let limited = ApiError::from(AdmissionDenied::PerMinuteLimit { limit: 60 });
        assert_eq!(limited.status_code(), 429);
        assert!(limited.message().contains("60 requests per minute"));
    }

    #[test]
    fn validation_errors_carry_the_field() {
        let err = ApiError::from(ValidationError::new("email", "Invalid e-mail address"));
        let body = err.to_json();
        assert_eq!(err.status_code(), 400);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["email"], "Invalid e-mail address");
    }

    #[test]
    fn context_and_storage_errors() {
        assert_eq!(ApiError::from(ContextError::NotFound("x.txt".into())).status_code(), 404);
        assert_eq!(ApiError::from(ContextError::InvalidName("../x".into())).status_code(), 400);
        assert_eq!(ApiError::from(StorageError::Unavailable("down".into())).status_code(), 502);
        assert_eq!(ApiError::from(AiError::Blocked("SAFETY".into())).status_code(), 422);
        assert_eq!(ApiError::from(AiError::EmptyResponse).status_code(), 502);
    }

    #[test]
    fn database_errors_hide_details() {
        let err = ApiError::from(DatabaseError::QueryError("syntax error at or near".into()));
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("syntax"));
        assert_eq!(ApiError::from(DatabaseError::Conflict("dup".into())).status_code(), 409);
    }

    #[test]
    fn error_envelope_shape() {
        let body = ApiError::forbidden("Admins only").to_json();
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Admins only");
        assert_eq!(body["code"], "FORBIDDEN");
    }
}
