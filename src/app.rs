use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::ai::{GeminiClient, GenerativeAi};
use crate::config::AppConfig;
use crate::context::ContextCache;
use crate::database::repositories::PgConfigStore;
use crate::database::DatabaseManager;
use crate::governor::{SystemClock, UsageGovernor};
use crate::handlers::{elevated::admin, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin};
use crate::storage::BucketClient;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub governor: Arc<UsageGovernor>,
    pub contexts: Arc<ContextCache>,
    pub assistant: Arc<dyn GenerativeAi>,
}

fn reveal(secret: &Option<SecretString>, name: &str) -> anyhow::Result<SecretString> {
    secret
        .as_ref()
        .map(|s| SecretString::from(s.expose_secret().to_string()))
        .with_context(|| format!("{} is not configured", name))
}

impl AppState {
    /// Wire the production dependencies from configuration. The governor is
    /// rehydrated from `system_config` before the state is returned.
    pub async fn from_config(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let pool = DatabaseManager::connect_lazy(&config.database)?;

        let governor = UsageGovernor::load(
            config.governor.clone(),
            Arc::new(PgConfigStore::new(pool.clone())),
            Arc::new(SystemClock),
        )
        .await;

        let storage_url = config
            .storage
            .url
            .as_deref()
            .context("STORAGE_URL is not configured")?;
        let bucket = BucketClient::new(storage_url, reveal(&config.storage.key, "STORAGE_KEY")?)?;
        let contexts = ContextCache::new(
            Arc::new(bucket),
            config.storage.context_bucket.clone(),
            config.storage.text_suffix.clone(),
        );

        let assistant = GeminiClient::new(
            config.assistant.base_url.clone(),
            config.assistant.model.clone(),
            reveal(&config.assistant.api_key, "GOOGLE_API_KEY")?,
            Duration::from_secs(config.assistant.timeout_secs),
            config.assistant.thinking_mode,
        )?;

        Ok(Self {
            config,
            pool,
            governor: Arc::new(governor),
            contexts: Arc::new(contexts),
            assistant: Arc::new(assistant),
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::health::root))
        .route("/health", get(public::health::health))
        .route("/api/auth/login", post(public::auth::login_post))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{assistant, auth, chats, projects, users};

    Router::new()
        .route("/api/auth/validate", get(auth::validate_get))
        .route("/api/auth/password", post(auth::password_post))
        .route("/api/users/me", get(users::me_get))
        .route("/api/projects", get(projects::projects_get))
        .route("/api/projects/:id", get(projects::project_get))
        .route("/api/projects/:id/chats", get(projects::project_chats_get))
        .route("/api/chats", post(chats::chats_post))
        .route("/api/chats/assistants", get(chats::assistants_get))
        .route(
            "/api/chats/:id",
            get(chats::chat_get).patch(chats::chat_patch).delete(chats::chat_delete),
        )
        .route("/api/chats/:id/messages", get(chats::chat_messages_get))
        .route("/api/chats/:id/notes", get(chats::chat_notes_get))
        .route("/api/assistant/messages", post(assistant::messages_post))
        .route("/api/assistant/regenerate", post(assistant::regenerate_post))
        .route("/api/assistant/notes", post(assistant::notes_post))
        .route("/api/assistant/status", get(assistant::status_get))
        .route("/api/assistant/contexts/check", get(assistant::contexts_check_get))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    use admin::{contexts, projects, system, users};

    Router::new()
        .route("/api/admin/users", get(users::users_get).post(users::users_post))
        .route("/api/admin/users/:id", patch(users::user_patch))
        .route("/api/admin/users/:id/password", post(users::user_password_post))
        .route("/api/admin/projects", post(projects::projects_post))
        .route("/api/admin/projects/:id/participants", post(projects::participants_post))
        .route("/api/admin/projects/:id/advisors", post(projects::advisors_post))
        .route("/api/admin/system/status", get(system::status_get))
        .route("/api/admin/system/toggle", post(system::toggle_post))
        .route("/api/admin/system/reset-monthly", post(system::reset_monthly_post))
        .route("/api/admin/system/stats", get(system::stats_get))
        .route("/api/admin/contexts", get(contexts::contexts_get).post(contexts::contexts_post))
        .route("/api/admin/contexts/reload", post(contexts::reload_post))
        .route(
            "/api/admin/contexts/:name",
            get(contexts::context_get).delete(contexts::context_delete),
        )
        // Layers run bottom-up: authenticate first, then check the role.
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, Generation, GenerationRequest};
    use crate::governor::MemoryConfigStore;
    use crate::storage::MemoryObjectStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct Silent;

    #[async_trait]
    impl GenerativeAi for Silent {
        async fn generate(&self, _request: GenerationRequest) -> Result<Generation, AiError> {
            Err(AiError::EmptyResponse)
        }

        fn model_name(&self) -> &str {
            "silent"
        }
    }

    async fn state() -> AppState {
        let mut config = AppConfig::development();
        config.security.jwt_secret = Some(SecretString::from("router-test-secret"));
        config.database.url = Some("postgres://apbia@127.0.0.1:1/apbia".to_string());
        let config = Arc::new(config);

        let governor = UsageGovernor::load(
            config.governor.clone(),
            Arc::new(MemoryConfigStore::new()),
            Arc::new(SystemClock),
        )
        .await;

        AppState {
            pool: DatabaseManager::connect_lazy(&config.database).unwrap(),
            governor: Arc::new(governor),
            contexts: Arc::new(ContextCache::new(Arc::new(MemoryObjectStore::new()), "context-files", ".txt")),
            assistant: Arc::new(Silent),
            config,
        }
    }

    #[tokio::test]
    async fn root_is_public() {
        let app = router(state().await);
        let res = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_need_authentication_first() {
        let app = router(state().await);
        let res = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/contexts/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let app = router(state().await);
        let res = app
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_accepts_configured_origins() {
        // Invalid header values are dropped rather than failing startup.
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }
}
