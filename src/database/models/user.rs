use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::auth::Role;
use crate::database::DatabaseError;

/// Raw `users` row; the role is still text.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub bp: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub bp: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| DatabaseError::QueryError(format!("user {}: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            bp: row.bp,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            password_hash: row.password_hash,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub bp: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub bp: Option<String>,
    pub active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.bp.is_none()
            && self.active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        UserRow {
            id: 3,
            name: "Ana".to_string(),
            email: "ana@ifsp.edu.br".to_string(),
            password_hash: "$2b$12$hash".to_string(),
            role: role.to_string(),
            bp: Some("BRG12345678".to_string()),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn converts_row_and_hides_hash() {
        let user = User::try_from(row("orientador")).unwrap();
        assert_eq!(user.role, Role::Advisor);

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "advisor");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(matches!(User::try_from(row("root")), Err(DatabaseError::QueryError(_))));
    }

    #[test]
    fn empty_update() {
        assert!(UserUpdate::default().is_empty());
        let update = UserUpdate {
            active: Some(false),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
