//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format nano-USD as a dollar string. Sub-cent amounts keep six
/// decimals so small unit prices stay legible.
pub fn format_usd(nanos: i64) -> String {
    let dollars = nanos as f64 / 1e9;
    if nanos == 0 || dollars.abs() >= 0.01 {
        format!("${:.2}", dollars)
    } else {
        format!("${:.6}", dollars)
    }
}

/// Color a utilization percentage by how close it is to the limit
pub fn color_percent(percent: f64) -> String {
    let formatted = format!("{:.1}%", percent);
    if percent >= 90.0 {
        formatted.red().to_string()
    } else if percent >= 70.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Color an anomaly severity string
pub fn color_severity(severity: &str) -> String {
    match severity {
        "critical" => severity.red().bold().to_string(),
        "high" => severity.red().to_string(),
        "warning" => severity.yellow().to_string(),
        "info" => severity.blue().to_string(),
        _ => severity.to_string(),
    }
}

/// Format a Unix timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}
