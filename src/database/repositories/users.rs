use sqlx::PgPool;

use crate::auth::Role;
use crate::database::models::{NewUser, User, UserRow, UserUpdate};
use crate::database::DatabaseError;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, bp, active, created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(&self, filter: &str, value: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, filter);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        self.fetch_optional("lower(email)", &email.to_lowercase()).await
    }

    pub async fn find_by_bp(&self, bp: &str) -> Result<Option<User>, DatabaseError> {
        self.fetch_optional("bp", bp).await
    }

    pub async fn list(&self, role: Option<Role>) -> Result<Vec<User>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM users WHERE ($1::text IS NULL OR role = $1) ORDER BY name",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    pub async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, role, bp) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.name)
            .bind(user.email.to_lowercase())
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.bp)
            .fetch_one(&self.pool)
            .await?;
        User::try_from(row)
    }

    pub async fn update(&self, id: i64, update: UserUpdate) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                role = COALESCE($4, role), \
                bp = COALESCE($5, bp), \
                active = COALESCE($6, active), \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(update.email.map(|e| e.to_lowercase()))
            .bind(update.role.map(|r| r.as_str()))
            .bind(&update.bp)
            .bind(update.active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        User::try_from(row)
    }

    pub async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    /// Number of users per role, active or not.
    pub async fn count_by_role(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
