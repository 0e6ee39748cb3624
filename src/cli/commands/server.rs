use clap::Subcommand;
use reqwest::Method;

use crate::cli::client::ApiClient;
use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from the /health endpoint")]
    Health,

    #[command(about = "Show server information from the API root endpoint")]
    Info,
}

pub async fn handle(cmd: ServerCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Health => {
            // 503 still carries a report, so read it instead of failing
            let (status, body) = client.raw(Method::GET, "/health", None).await?;
            let data = body.get("data").cloned();
            if status.is_success() {
                output_success(output_format, "Server is healthy", data)
            } else {
                output_data(output_format, &body)?;
                anyhow::bail!("server is degraded ({})", status.as_u16())
            }
        }
        ServerCommands::Info => output_data(output_format, &client.get("/").await?),
    }
}
