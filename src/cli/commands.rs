//! CLI commands implementation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::models::Campaign;

#[derive(Parser)]
#[command(name = "dialflow")]
#[command(about = "Outbound AI-voice call campaign orchestration")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "DIALFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration server
    Serve {
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show campaign progress from a running server
    Status {
        /// Base URL of the running server
        #[arg(long, default_value = "http://localhost:8088")]
        url: String,
    },

    /// Probe a running server's dependency health
    Check {
        /// Base URL of the running server
        #[arg(long, default_value = "http://localhost:8088")]
        url: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            crate::server::serve(&settings, &host, port).await
        }
        Commands::Status { url } => status(&url).await,
        Commands::Check { url } => check(&url).await,
    }
}

/// Print one line per campaign from the polling API.
async fn status(base_url: &str) -> anyhow::Result<()> {
    let url = format!("{}/api/campaigns", base_url.trim_end_matches('/'));
    let campaigns: Vec<Campaign> = reqwest::get(&url)
        .await?
        .error_for_status()?
        .json()
        .await?;

    if campaigns.is_empty() {
        println!("No campaigns.");
        return Ok(());
    }

    for campaign in campaigns {
        println!(
            "{}  {:<9}  {:>4}/{:<4}  ok {:<4} failed {:<4}  {}",
            campaign.id,
            campaign.status.as_str(),
            campaign.current_lead_index,
            campaign.total_leads(),
            campaign.successful_calls,
            campaign.failed_calls,
            campaign.name
        );
    }
    Ok(())
}

/// Print the health report; non-zero exit when degraded.
async fn check(base_url: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let response = reqwest::get(&url).await?;
    let healthy = response.status().is_success();

    let report: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !healthy {
        anyhow::bail!("one or more dependencies are unreachable");
    }
    Ok(())
}
