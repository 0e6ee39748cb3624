use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ContextCommands {
    #[command(about = "List context files in the bucket")]
    List,

    #[command(about = "Drop the server's context cache and load all files again")]
    Reload,
}

pub async fn handle(cmd: ContextCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ContextCommands::List => output_data(output_format, &client.get("/api/admin/contexts").await?),
        ContextCommands::Reload => {
            let summary = client.post("/api/admin/contexts/reload", &json!({})).await?;
            output_success(output_format, "Contexts reloaded", Some(summary))
        }
    }
}
