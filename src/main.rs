use std::sync::Arc;

use anyhow::Context as _;
use apbia_api::{config, router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();

    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(missing) = config.validate() {
        tracing::error!(missing = ?missing, "Required configuration is missing");
        anyhow::bail!("missing required configuration: {}", missing.join(", "));
    }

    tracing::info!("Starting APBIA API in {:?} mode", config.environment);

    let state = AppState::from_config(Arc::clone(&config)).await?;
    let report = state.governor.report().await;
    tracing::info!(
        system_enabled = report.system_enabled,
        month_requests = report.month_requests,
        usage_percent = report.usage_percent,
        "Usage governor ready"
    );

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("APBIA API listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
