//! Recommendation-related CLI commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, Recommendation};
use crate::output::{color_severity, print_warning, OutputFormat};

/// Row for recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Impact")]
    impact: String,
    #[tabled(rename = "Rationale")]
    rationale: String,
}

/// Show optimization recommendations for an agent
pub async fn show_recommendations(
    client: &ApiClient,
    agent: &str,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/agents/{}/recommendations", agent);
    let recommendations: Vec<Recommendation> = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&recommendations)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if recommendations.is_empty() {
                print_warning("No recommendations for this agent");
                return Ok(());
            }

            let rows: Vec<RecommendationRow> = recommendations
                .iter()
                .map(|r| RecommendationRow {
                    priority: r.priority.to_string(),
                    metric: r.metric.clone(),
                    severity: color_severity(&r.severity),
                    action: r.action.clone(),
                    impact: r.impact.clone(),
                    rationale: r.rationale.clone(),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} recommendations", recommendations.len());
        }
    }

    Ok(())
}
