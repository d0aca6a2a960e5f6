//! Engine configuration

use anyhow::Result;
use serde::Deserialize;

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Instance name carried in structured log records
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Snapshot and analysis cadence in seconds
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,

    /// Budget check cadence in seconds
    #[serde(default = "default_cost_interval")]
    pub cost_interval_secs: u64,

    /// Default daily budget per agent in USD
    #[serde(default = "default_daily_budget")]
    pub default_daily_budget_usd: f64,

    /// Fraction of the budget at which the advisory alert fires
    #[serde(default = "default_budget_alert_threshold")]
    pub budget_alert_threshold: f64,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "metering-engine".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_snapshot_interval() -> u64 {
    60
}

fn default_cost_interval() -> u64 {
    300
}

fn default_daily_budget() -> f64 {
    100.0
}

fn default_budget_alert_threshold() -> f64 {
    0.8
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENGINE"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| EngineConfig {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            snapshot_interval_secs: default_snapshot_interval(),
            cost_interval_secs: default_cost_interval(),
            default_daily_budget_usd: default_daily_budget(),
            budget_alert_threshold: default_budget_alert_threshold(),
        }))
    }
}
