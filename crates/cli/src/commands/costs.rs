//! Cost-related CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, CostTracking};
use crate::output::{format_timestamp, format_usd, print_warning, OutputFormat};

/// Row for spend by resource table
#[derive(Tabled)]
struct CostRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

/// Show cost tracking for an agent over a trailing window
pub async fn show_costs(
    client: &ApiClient,
    agent: &str,
    hours: i64,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/agents/{}/costs?hours={}", agent, hours);
    let result: CostTracking = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Cost Tracking".bold());
            println!("{}", "=".repeat(50));
            println!("Agent:                  {}", result.agent_id.cyan());
            println!(
                "Window:                 {} to {}",
                format_timestamp(result.period_start),
                format_timestamp(result.period_end)
            );
            println!("Events:                 {}", result.event_count);
            println!();

            if !result.by_resource.is_empty() {
                println!("{}", "Spend by Resource".bold());
                println!("{}", "-".repeat(50));

                let rows: Vec<CostRow> = result
                    .by_resource
                    .iter()
                    .map(|line| CostRow {
                        resource: line.resource.clone(),
                        amount: line.amount.to_string(),
                        cost: format_usd(line.cost),
                    })
                    .collect();

                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
                println!();
            }

            println!(
                "{}  {}",
                "Total Spend:".bold(),
                format_usd(result.total_cost).green().bold()
            );
            println!(
                "Budget:                 {}",
                format_usd(result.budget_limit)
            );

            if result.alert_triggered {
                print_warning(&format!(
                    "Spend has crossed {:.0}% of the {} budget",
                    result.alert_threshold * 100.0,
                    format_usd(result.budget_limit)
                ));
            }
        }
    }

    Ok(())
}
