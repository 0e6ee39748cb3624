use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use super::ServiceError;
use crate::auth::{generate_jwt, hash_password, verify_password, Claims, Role};
use crate::config::AppConfig;
use crate::database::models::{NewUser, User, UserUpdate};
use crate::database::repositories::UserRepository;
use crate::validators::{self, ValidationError};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub bp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub bp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bp: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

/// Credentials, tokens and user accounts.
pub struct AuthService {
    users: UserRepository,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, config: Arc<AppConfig>) -> Self {
        Self {
            users: UserRepository::new(pool),
            config,
        }
    }

    /// Participants must also present the BP registered to their account.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        validators::validate_email(&request.email)?;

        let invalid = || ServiceError::Unauthorized("Invalid credentials".to_string());
        let user = self.users.find_by_email(&request.email).await?.ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password_hash) {
            warn!(user_id = user.id, "Login failed: wrong password");
            return Err(invalid());
        }
        if !user.active {
            return Err(ServiceError::Forbidden("Account is disabled".to_string()));
        }

        if user.role == Role::Participant {
            let bp = request
                .bp
                .as_deref()
                .ok_or_else(|| ValidationError::new("bp", "BP is required for participants"))?;
            let bp = validators::normalize_bp(bp)?;
            if user.bp.as_deref() != Some(bp.as_str()) {
                warn!(user_id = user.id, "Login failed: BP mismatch");
                return Err(invalid());
            }
        }

        let expiry_hours = self.config.security.jwt_expiry_hours;
        let claims = Claims::new(user.id, user.email.clone(), user.role, expiry_hours);
        let token = generate_jwt(&claims, &self.config.security)?;

        info!(user_id = user.id, role = %user.role, "User logged in");
        Ok(LoginResponse {
            token,
            token_type: "bearer",
            expires_in: expiry_hours * 3600,
            user,
        })
    }

    /// The account behind a token, provided it still exists and is active.
    pub async fn current_user(&self, user_id: i64) -> Result<User, ServiceError> {
        match self.users.find_by_id(user_id).await? {
            Some(user) if user.active => Ok(user),
            Some(_) => Err(ServiceError::Unauthorized("Account is disabled".to_string())),
            None => Err(ServiceError::Unauthorized("User no longer exists".to_string())),
        }
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let user = self.current_user(user_id).await?;
        if !verify_password(current_password, &user.password_hash) {
            return Err(ValidationError::new("current_password", "Current password is incorrect").into());
        }

        validators::validate_password(new_password)?;
        let hash = hash_password(new_password, self.config.security.bcrypt_cost)?;
        self.users.set_password(user_id, &hash).await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ServiceError> {
        let name = validators::require_text("name", &request.name)?;
        validators::validate_email(&request.email)?;
        validators::validate_password(&request.password)?;
        let role = validators::parse_role(&request.role)?;

        let bp = match (role, request.bp.as_deref()) {
            (Role::Participant, None) => {
                return Err(ValidationError::new("bp", "BP is required for participants").into())
            }
            (_, Some(bp)) => Some(validators::normalize_bp(bp)?),
            (_, None) => None,
        };

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(ServiceError::Conflict("E-mail already registered".to_string()));
        }
        if let Some(bp) = &bp {
            if self.users.find_by_bp(bp).await?.is_some() {
                return Err(ServiceError::Conflict("BP already registered".to_string()));
            }
        }

        let password_hash = hash_password(&request.password, self.config.security.bcrypt_cost)?;
        let user = self
            .users
            .create(NewUser {
                name,
                email: request.email,
                password_hash,
                role,
                bp,
            })
            .await?;

        info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    pub async fn update_user(&self, id: i64, request: UpdateUserRequest) -> Result<User, ServiceError> {
        let update = UserUpdate {
            name: request
                .name
                .as_deref()
                .map(|name| validators::require_text("name", name))
                .transpose()?,
            email: match request.email {
                Some(email) => {
                    validators::validate_email(&email)?;
                    Some(email)
                }
                None => None,
            },
            bp: request.bp.as_deref().map(validators::normalize_bp).transpose()?,
            role: request.role.as_deref().map(validators::parse_role).transpose()?,
            active: request.active,
        };

        if update.is_empty() {
            return Err(ValidationError::new("body", "Nothing to update").into());
        }

        let user = self.users.update(id, update).await?;
        info!(user_id = id, "User updated");
        Ok(user)
    }

    pub async fn reset_password(&self, id: i64, new_password: &str) -> Result<(), ServiceError> {
        validators::validate_password(new_password)?;
        let hash = hash_password(new_password, self.config.security.bcrypt_cost)?;
        self.users.set_password(id, &hash).await?;

        info!(user_id = id, "Password reset by admin");
        Ok(())
    }

    pub async fn list_users(&self, role: Option<&str>) -> Result<Vec<User>, ServiceError> {
        let role = role.map(validators::parse_role).transpose()?;
        Ok(self.users.list(role).await?)
    }

    /// Existing user with the given role, for project membership links.
    pub async fn require_user_with_role(&self, id: i64, role: Role) -> Result<User, ServiceError> {
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))?;

        if user.role != role {
            return Err(ValidationError::new("user_id", format!("User {} is not a {}", id, role)).into());
        }
        Ok(user)
    }
}
