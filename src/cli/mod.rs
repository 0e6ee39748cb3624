pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use client::ApiClient;

#[derive(Parser)]
#[command(name = "apbia")]
#[command(about = "APBIA CLI - operate the usage governor and context files of an APBIA server")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "APBIA_URL",
        default_value = "http://localhost:5000",
        help = "Base URL of the APBIA server"
    )]
    pub url: String,

    #[arg(long, global = true, env = "APBIA_TOKEN", hide_env_values = true, help = "Admin JWT")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Server information and health")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },

    #[command(about = "Usage governor: status, kill switch, monthly reset")]
    System {
        #[command(subcommand)]
        cmd: commands::system::SystemCommands,
    },

    #[command(about = "Context files used to ground answers")]
    Contexts {
        #[command(subcommand)]
        cmd: commands::contexts::ContextCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let client = ApiClient::new(&cli.url, cli.token.clone())?;

    match cli.command {
        Commands::Server { cmd } => commands::server::handle(cmd, &client, output_format).await,
        Commands::System { cmd } => commands::system::handle(cmd, &client, output_format).await,
        Commands::Contexts { cmd } => commands::contexts::handle(cmd, &client, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_disable_with_reason() {
        let cli = Cli::try_parse_from([
            "apbia",
            "--json",
            "--url",
            "http://api.local",
            "system",
            "disable",
            "--reason",
            "exam week",
        ])
        .unwrap();

        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert_eq!(cli.url, "http://api.local");
        match cli.command {
            Commands::System {
                cmd: commands::system::SystemCommands::Disable { reason },
            } => assert_eq!(reason.as_deref(), Some("exam week")),
            _ => panic!("expected system disable"),
        }
    }

    #[test]
    fn stats_days_defaults_to_thirty() {
        let cli = Cli::try_parse_from(["apbia", "system", "stats"]).unwrap();
        match cli.command {
            Commands::System {
                cmd: commands::system::SystemCommands::Stats { days },
            } => assert_eq!(days, 30),
            _ => panic!("expected system stats"),
        }
    }
}
