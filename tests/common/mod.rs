#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use tokio::task::JoinHandle;

use apbia_api::ai::{AiError, Generation, GenerationRequest, GenerativeAi};
use apbia_api::auth::{generate_jwt, Claims, Role};
use apbia_api::config::{AppConfig, GovernorConfig};
use apbia_api::context::ContextCache;
use apbia_api::database::DatabaseManager;
use apbia_api::governor::{MemoryConfigStore, SystemClock, UsageGovernor};
use apbia_api::storage::MemoryObjectStore;
use apbia_api::AppState;

pub const CONTEXT_BUCKET: &str = "context-files";

// Nothing listens on port 1, so every query fails fast with a pool timeout.
const UNREACHABLE_DATABASE: &str = "postgres://apbia@127.0.0.1:1/apbia";

/// Answers every prompt with the same text.
pub struct StubAi;

#[async_trait]
impl GenerativeAi for StubAi {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, AiError> {
        Ok(Generation {
            text: format!("stub answer to: {}", request.question),
            total_tokens: Some(42),
        })
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

pub fn test_governor_config() -> GovernorConfig {
    GovernorConfig {
        throttling_delay_seconds: 0.0,
        ..GovernorConfig::default()
    }
}

/// One in-process API server per test, with in-memory stores and no database.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub objects: Arc<MemoryObjectStore>,
    pub config_store: Arc<MemoryConfigStore>,
    pub client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(test_governor_config()).await
    }

    pub async fn spawn_with(governor: GovernorConfig) -> Result<Self> {
        let mut config = AppConfig::development();
        config.security.jwt_secret = Some(SecretString::from("integration-test-secret"));
        config.database.url = Some(UNREACHABLE_DATABASE.to_string());
        config.database.connection_timeout = 1;
        config.governor = governor;
        let config = Arc::new(config);

        let pool = DatabaseManager::connect_lazy(&config.database)?;
        let config_store = Arc::new(MemoryConfigStore::new());
        let objects = Arc::new(MemoryObjectStore::new());

        let governor = UsageGovernor::load(config.governor.clone(), config_store.clone(), Arc::new(SystemClock)).await;
        let contexts = ContextCache::new(objects.clone(), CONTEXT_BUCKET, ".txt");

        let state = AppState {
            config,
            pool,
            governor: Arc::new(governor),
            contexts: Arc::new(contexts),
            assistant: Arc::new(StubAi),
        };

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let app = apbia_api::router(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            objects,
            config_store,
            client: reqwest::Client::new(),
            handle,
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, user_id: i64, role: Role) -> String {
        let claims = Claims::new(user_id, format!("user{}@ifsp.edu.br", user_id), role, 1);
        generate_jwt(&claims, &self.state.config.security).expect("failed to sign test token")
    }

    pub fn admin_token(&self) -> String {
        self.token(1, Role::Admin)
    }

    pub fn participant_token(&self) -> String {
        self.token(2, Role::Participant)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
