//! Performance analysis CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{AnalysisReport, ApiClient};
use crate::output::{color_severity, format_timestamp, print_info, OutputFormat};

/// Row for trends table
#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "Rate/min")]
    rate: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Samples")]
    samples: String,
}

/// Row for anomalies table
#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Detector")]
    detector: String,
}

/// Show the full performance analysis for an agent
pub async fn show_analysis(client: &ApiClient, agent: &str, format: OutputFormat) -> Result<()> {
    let path = format!("api/v1/agents/{}/analysis", agent);
    let report: AnalysisReport = client.get(&path).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Performance Analysis".bold());
            println!("{}", "=".repeat(50));
            println!("Agent:                  {}", report.agent_id.cyan());
            println!(
                "Generated:              {}",
                format_timestamp(report.generated_at).dimmed()
            );
            println!("Samples:                {}", report.samples);
            println!();

            if report.samples == 0 {
                print_info("No snapshots recorded yet; scores start at zero");
                return Ok(());
            }

            println!("{}", "Benchmark Scores".bold());
            println!("{}", "-".repeat(50));
            println!("Overall:                {}", color_score(report.score.overall));
            println!("Efficiency:             {}", color_score(report.score.efficiency));
            println!("Reliability:            {}", color_score(report.score.reliability));
            println!("Quality:                {}", color_score(report.score.quality));
            println!("Scalability:            {}", color_score(report.score.scalability));
            println!(
                "Cost Effectiveness:     {}",
                color_score(report.score.cost_effectiveness)
            );
            println!();

            if !report.trends.is_empty() {
                println!("{}", "Trends".bold());
                println!("{}", "-".repeat(50));

                let rows: Vec<TrendRow> = report
                    .trends
                    .iter()
                    .map(|t| TrendRow {
                        metric: t.metric.clone(),
                        direction: t.direction.clone(),
                        rate: format!("{:+.3}", t.change_rate),
                        confidence: format!("{:.0}%", t.confidence),
                        samples: t.samples.to_string(),
                    })
                    .collect();

                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
                println!();
            }

            if report.anomalies.is_empty() {
                print_info("No anomalies in the window");
            } else {
                println!("{}", "Anomalies".bold());
                println!("{}", "-".repeat(50));

                let rows: Vec<AnomalyRow> = report
                    .anomalies
                    .iter()
                    .map(|a| AnomalyRow {
                        time: format_timestamp(a.timestamp),
                        metric: a.metric.clone(),
                        severity: color_severity(&a.severity),
                        expected: format!("{:.1}", a.expected),
                        actual: format!("{:.1}", a.actual),
                        score: format!("{:.0}", a.score),
                        detector: a.detector.clone(),
                    })
                    .collect();

                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
            }
        }
    }

    Ok(())
}

/// Color a 0-100 benchmark score
fn color_score(score: f64) -> String {
    let formatted = format!("{:.1}", score);
    if score >= 80.0 {
        formatted.green().to_string()
    } else if score >= 60.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
