//! Quota-related CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, ResourceQuota};
use crate::output::{color_percent, format_timestamp, OutputFormat};

/// Row for quota table
#[derive(Tabled)]
struct QuotaRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Used")]
    used: String,
    #[tabled(rename = "Limit")]
    limit: String,
    #[tabled(rename = "Utilization")]
    utilization: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Resets")]
    resets: String,
}

/// Show quota windows for an agent
pub async fn show_quotas(client: &ApiClient, agent: &str, format: OutputFormat) -> Result<()> {
    let path = format!("api/v1/agents/{}/quotas", agent);
    let quotas: Vec<ResourceQuota> = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&quotas)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Resource Quotas".bold());
            println!("{}", "=".repeat(50));
            println!("Agent:                  {}", agent.cyan());
            println!();

            let rows: Vec<QuotaRow> = quotas
                .iter()
                .map(|q| QuotaRow {
                    resource: q.resource.clone(),
                    used: q.used.to_string(),
                    limit: q.limit.to_string(),
                    utilization: color_percent(utilization_percent(q)),
                    period: q.period.clone(),
                    resets: format_timestamp(q.reset_at),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

fn utilization_percent(quota: &ResourceQuota) -> f64 {
    if quota.limit == 0 {
        return 0.0;
    }
    quota.used as f64 / quota.limit as f64 * 100.0
}
