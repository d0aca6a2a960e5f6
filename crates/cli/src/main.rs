//! Agent Metering Engine CLI
//!
//! A command-line tool for querying quotas, costs, performance
//! analytics, and scaling history from the metering engine.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analysis, costs, quota, recommendations, scaling};

/// Agent Metering Engine CLI
#[derive(Parser)]
#[command(name = "ame")]
#[command(author, version, about = "CLI for the Agent Metering Engine", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via AME_API_URL env var)
    #[arg(long, env = "AME_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show quota windows for an agent
    Quota {
        /// Agent identifier
        agent: String,
    },

    /// Show cost tracking over a trailing window
    Costs {
        /// Agent identifier
        agent: String,

        /// Trailing window in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },

    /// Show optimization recommendations
    Recommendations {
        /// Agent identifier
        agent: String,
    },

    /// Show the full performance analysis
    Analysis {
        /// Agent identifier
        agent: String,
    },

    /// Show recent scaling events
    ScalingHistory {
        /// Agent identifier
        agent: String,

        /// Maximum number of events to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Quota { agent } => {
            quota::show_quotas(&client, &agent, cli.format).await?;
        }
        Commands::Costs { agent, hours } => {
            costs::show_costs(&client, &agent, hours, cli.format).await?;
        }
        Commands::Recommendations { agent } => {
            recommendations::show_recommendations(&client, &agent, cli.format).await?;
        }
        Commands::Analysis { agent } => {
            analysis::show_analysis(&client, &agent, cli.format).await?;
        }
        Commands::ScalingHistory { agent, limit } => {
            scaling::show_history(&client, &agent, limit, cli.format).await?;
        }
    }

    Ok(())
}
