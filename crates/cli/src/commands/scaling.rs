//! Scaling history CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, ScalingEvent};
use crate::output::{format_timestamp, print_warning, OutputFormat};

/// Row for scaling events table
#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Policy")]
    policy: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Instances")]
    instances: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Show recent scaling events for an agent
pub async fn show_history(
    client: &ApiClient,
    agent: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/agents/{}/scaling/history?limit={}", agent, limit);
    let events: Vec<ScalingEvent> = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&events)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if events.is_empty() {
                print_warning("No scaling events recorded for this agent");
                return Ok(());
            }

            let rows: Vec<EventRow> = events
                .iter()
                .map(|e| EventRow {
                    time: format_timestamp(e.timestamp),
                    policy: e.policy_id.clone(),
                    metric: e.metric.clone(),
                    observed: format!("{:.1}", e.observed),
                    threshold: format!("{:.1}", e.threshold),
                    instances: format!("{} -> {}", e.from_instances, e.to_instances),
                    result: if e.succeeded {
                        "applied".green().to_string()
                    } else {
                        format!(
                            "failed: {}",
                            e.error.as_deref().unwrap_or("unknown error")
                        )
                        .red()
                        .to_string()
                    },
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} events", events.len());
        }
    }

    Ok(())
}
