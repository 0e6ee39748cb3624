use chrono::{Datelike, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use super::{ensure_project_access, ServiceError};
use crate::database::models::{NewProject, Project, ProjectDetail};
use crate::database::repositories::ProjectRepository;
use crate::middleware::AuthUser;
use crate::validators;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub area: String,
    pub edition_year: i32,
}

pub struct ProjectService {
    projects: ProjectRepository,
}

impl ProjectService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            projects: ProjectRepository::new(pool),
        }
    }

    pub async fn list_for(&self, user: &AuthUser) -> Result<Vec<Project>, ServiceError> {
        Ok(self.projects.list_for_user(user.user_id, user.role).await?)
    }

    pub async fn detail(&self, user: &AuthUser, id: i64) -> Result<ProjectDetail, ServiceError> {
        let project = self.find(id).await?;
        ensure_project_access(&self.projects, user, id).await?;

        Ok(ProjectDetail {
            participants: self.projects.participants(id).await?,
            advisors: self.projects.advisors(id).await?,
            project,
        })
    }

    pub async fn create(&self, request: CreateProjectRequest) -> Result<Project, ServiceError> {
        let name = validators::require_text("name", &request.name)?;
        validators::validate_area(&request.area)?;
        validators::validate_edition_year(request.edition_year, Utc::now().year())?;

        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let project = self
            .projects
            .create(NewProject {
                name,
                description,
                area: request.area,
                edition_year: request.edition_year,
            })
            .await?;

        info!(project_id = project.id, edition_year = project.edition_year, "Project created");
        Ok(project)
    }

    pub async fn add_participant(&self, project_id: i64, user_id: i64) -> Result<(), ServiceError> {
        self.find(project_id).await?;
        self.projects.add_participant(project_id, user_id).await?;
        info!(project_id, user_id, "Participant linked to project");
        Ok(())
    }

    pub async fn add_advisor(&self, project_id: i64, user_id: i64) -> Result<(), ServiceError> {
        self.find(project_id).await?;
        self.projects.add_advisor(project_id, user_id).await?;
        info!(project_id, user_id, "Advisor linked to project");
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Project, ServiceError> {
        self.projects
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Project {} not found", id)))
    }
}
