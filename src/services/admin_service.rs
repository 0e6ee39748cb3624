use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

use super::ServiceError;
use crate::context::{CacheSummary, ContextCache, UploadReceipt};
use crate::database::repositories::{ChatRepository, MessageRepository, ProjectRepository, UserRepository};
use crate::database::{DatabaseError, DatabaseManager};
use crate::governor::{PeriodStats, UsageGovernor, UsageReport};
use crate::storage::ObjectInfo;
use crate::validators;

pub const DEFAULT_DISABLE_REASON: &str = "Scheduled maintenance";
pub const DEFAULT_STATS_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enable: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadContextRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct EntityCounts {
    pub users_total: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub projects: i64,
    pub chats: i64,
    pub messages: i64,
}

#[derive(Debug, Serialize)]
pub struct ContextOverview {
    pub cache: CacheSummary,
    pub available: Option<usize>,
}

/// Everything an operator looks at before touching the kill switch.
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub usage: UsageReport,
    pub stats: PeriodStats,
    pub contexts: ContextOverview,
    pub database_ok: bool,
    /// Absent when the database could not be queried.
    pub counts: Option<EntityCounts>,
}

#[derive(Debug, Serialize)]
pub struct ContextFile {
    pub name: String,
    pub characters: usize,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ReloadSummary {
    pub loaded_files: usize,
    pub cache: CacheSummary,
}

pub struct AdminService {
    pool: PgPool,
    governor: Arc<UsageGovernor>,
    contexts: Arc<ContextCache>,
}

impl AdminService {
    pub fn new(pool: PgPool, governor: Arc<UsageGovernor>, contexts: Arc<ContextCache>) -> Self {
        Self {
            pool,
            governor,
            contexts,
        }
    }

    async fn entity_counts(&self) -> Result<EntityCounts, DatabaseError> {
        let users_by_role: BTreeMap<String, i64> = UserRepository::new(self.pool.clone())
            .count_by_role()
            .await?
            .into_iter()
            .collect();

        Ok(EntityCounts {
            users_total: users_by_role.values().sum(),
            users_by_role,
            projects: ProjectRepository::new(self.pool.clone()).count().await?,
            chats: ChatRepository::new(self.pool.clone()).count().await?,
            messages: MessageRepository::new(self.pool.clone()).count().await?,
        })
    }

    /// Never fails: unreachable dependencies show up as missing sections.
    pub async fn system_status(&self) -> SystemStatus {
        let database_ok = match DatabaseManager::health_check(&self.pool).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        };

        let counts = if database_ok {
            match self.entity_counts().await {
                Ok(counts) => Some(counts),
                Err(e) => {
                    warn!(error = %e, "Could not count entities");
                    None
                }
            }
        } else {
            None
        };

        let available = match self.contexts.list_available().await {
            Ok(files) => Some(files.len()),
            Err(e) => {
                warn!(error = %e, "Could not list context files");
                None
            }
        };

        SystemStatus {
            usage: self.governor.report().await,
            stats: self.governor.period_stats(DEFAULT_STATS_DAYS).await,
            contexts: ContextOverview {
                cache: self.contexts.summary().await,
                available,
            },
            database_ok,
            counts,
        }
    }

    pub async fn toggle(&self, request: ToggleRequest) -> UsageReport {
        if request.enable {
            self.governor.enable_system().await;
        } else {
            let reason = request
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_DISABLE_REASON);
            self.governor.disable_system(reason).await;
        }
        self.governor.report().await
    }

    pub async fn reset_monthly(&self) -> UsageReport {
        self.governor.reset_monthly().await;
        self.governor.report().await
    }

    pub async fn stats(&self, days: Option<u32>) -> PeriodStats {
        self.governor.period_stats(days.unwrap_or(DEFAULT_STATS_DAYS)).await
    }

    pub async fn list_contexts(&self) -> Result<Vec<ObjectInfo>, ServiceError> {
        Ok(self.contexts.list_available().await?)
    }

    pub async fn upload_context(&self, request: UploadContextRequest) -> Result<UploadReceipt, ServiceError> {
        let name = validators::sanitize_filename(&request.name);
        validators::require_text("content", &request.content)?;
        Ok(self.contexts.upload(&name, &request.content).await?)
    }

    pub async fn reload_contexts(&self) -> Result<ReloadSummary, ServiceError> {
        self.contexts.invalidate().await;
        let loaded = self.contexts.load_all().await?;
        Ok(ReloadSummary {
            loaded_files: loaded.len(),
            cache: self.contexts.summary().await,
        })
    }

    pub async fn read_context(&self, name: &str) -> Result<ContextFile, ServiceError> {
        let content = self.contexts.load_one(name).await?;
        Ok(ContextFile {
            name: name.to_string(),
            characters: content.chars().count(),
            content,
        })
    }

    pub async fn delete_context(&self, name: &str) -> Result<(), ServiceError> {
        Ok(self.contexts.delete(name).await?)
    }
}
