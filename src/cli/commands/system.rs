use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum SystemCommands {
    #[command(about = "Full system report: usage, contexts, entity counts")]
    Status,

    #[command(about = "Turn the assistant back on")]
    Enable,

    #[command(about = "Turn the assistant off")]
    Disable {
        #[arg(long, help = "Reason recorded in the server log")]
        reason: Option<String>,
    },

    #[command(about = "Zero the monthly request counter")]
    ResetMonthly,

    #[command(about = "Usage statistics for a period")]
    Stats {
        #[arg(long, default_value_t = 30, help = "Period length in days")]
        days: u32,
    },
}

pub async fn handle(cmd: SystemCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SystemCommands::Status => output_data(output_format, &client.get("/api/admin/system/status").await?),
        SystemCommands::Enable => {
            let report = client
                .post("/api/admin/system/toggle", &json!({ "enable": true }))
                .await?;
            output_success(output_format, "System enabled", Some(report))
        }
        SystemCommands::Disable { reason } => {
            let report = client
                .post("/api/admin/system/toggle", &json!({ "enable": false, "reason": reason }))
                .await?;
            output_success(output_format, "System disabled", Some(report))
        }
        SystemCommands::ResetMonthly => {
            let report = client.post("/api/admin/system/reset-monthly", &json!({})).await?;
            output_success(output_format, "Monthly counter reset", Some(report))
        }
        SystemCommands::Stats { days } => {
            let path = format!("/api/admin/system/stats?days={}", days);
            output_data(output_format, &client.get(&path).await?)
        }
    }
}
