use sqlx::PgPool;

use crate::auth::Role;
use crate::database::models::{NewProject, Project, ProjectMember};
use crate::database::DatabaseError;

const PROJECT_COLUMNS: &str = "p.id, p.name, p.description, p.area, p.edition_year, p.created_at";

/// Membership tables, one per role that can belong to a project.
#[derive(Debug, Clone, Copy)]
enum Membership {
    Participants,
    Advisors,
}

impl Membership {
    fn table(self) -> &'static str {
        match self {
            Membership::Participants => "project_participants",
            Membership::Advisors => "project_advisors",
        }
    }
}

#[derive(Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Project>, DatabaseError> {
        let sql = format!("SELECT {} FROM projects p WHERE p.id = $1", PROJECT_COLUMNS);
        Ok(sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Projects visible to a user: admins see all, others see their memberships.
    pub async fn list_for_user(&self, user_id: i64, role: Role) -> Result<Vec<Project>, DatabaseError> {
        let query = match role {
            Role::Admin => {
                let sql = format!(
                    "SELECT {} FROM projects p ORDER BY p.edition_year DESC, p.name",
                    PROJECT_COLUMNS
                );
                return Ok(sqlx::query_as::<_, Project>(&sql).fetch_all(&self.pool).await?);
            }
            Role::Participant | Role::Advisor => format!(
                "SELECT {} FROM projects p JOIN {} m ON m.project_id = p.id \
                 WHERE m.user_id = $1 ORDER BY p.edition_year DESC, p.name",
                PROJECT_COLUMNS,
                Self::membership_for(role).table()
            ),
        };

        Ok(sqlx::query_as::<_, Project>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn create(&self, project: NewProject) -> Result<Project, DatabaseError> {
        let sql = format!(
            "INSERT INTO projects AS p (name, description, area, edition_year) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            PROJECT_COLUMNS
        );
        Ok(sqlx::query_as::<_, Project>(&sql)
            .bind(&project.name)
            .bind(&project.description)
            .bind(&project.area)
            .bind(project.edition_year)
            .fetch_one(&self.pool)
            .await?)
    }

    fn membership_for(role: Role) -> Membership {
        match role {
            Role::Advisor => Membership::Advisors,
            _ => Membership::Participants,
        }
    }

    async fn add_member(&self, membership: Membership, project_id: i64, user_id: i64) -> Result<(), DatabaseError> {
        let sql = format!(
            "INSERT INTO {} (project_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            membership.table()
        );
        sqlx::query(&sql)
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_participant(&self, project_id: i64, user_id: i64) -> Result<(), DatabaseError> {
        self.add_member(Membership::Participants, project_id, user_id).await
    }

    pub async fn add_advisor(&self, project_id: i64, user_id: i64) -> Result<(), DatabaseError> {
        self.add_member(Membership::Advisors, project_id, user_id).await
    }

    async fn members(&self, membership: Membership, project_id: i64) -> Result<Vec<ProjectMember>, DatabaseError> {
        let sql = format!(
            "SELECT u.id, u.name, u.email FROM users u JOIN {} m ON m.user_id = u.id \
             WHERE m.project_id = $1 ORDER BY u.name",
            membership.table()
        );
        Ok(sqlx::query_as::<_, ProjectMember>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn participants(&self, project_id: i64) -> Result<Vec<ProjectMember>, DatabaseError> {
        self.members(Membership::Participants, project_id).await
    }

    pub async fn advisors(&self, project_id: i64) -> Result<Vec<ProjectMember>, DatabaseError> {
        self.members(Membership::Advisors, project_id).await
    }

    /// True when the user is a participant or advisor of the project.
    pub async fn is_member(&self, project_id: i64, user_id: i64) -> Result<bool, DatabaseError> {
        let (member,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM project_participants WHERE project_id = $1 AND user_id = $2) \
                 OR EXISTS (SELECT 1 FROM project_advisors WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
