//! Core data models for the metering engine

use crate::money::Usd;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metered resource categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Compute time, milliseconds
    ComputeTime,
    /// AI inference tokens
    InferenceTokens,
    /// Persistent storage, megabytes
    StorageMb,
    /// Outbound network requests
    NetworkRequests,
    /// Blockchain fee units
    ChainFees,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::ComputeTime,
        ResourceType::InferenceTokens,
        ResourceType::StorageMb,
        ResourceType::NetworkRequests,
        ResourceType::ChainFees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::ComputeTime => "compute_time",
            ResourceType::InferenceTokens => "inference_tokens",
            ResourceType::StorageMb => "storage_mb",
            ResourceType::NetworkRequests => "network_requests",
            ResourceType::ChainFees => "chain_fees",
        }
    }

    /// Display unit for CLI and log output
    pub fn unit(&self) -> &'static str {
        match self {
            ResourceType::ComputeTime => "ms",
            ResourceType::InferenceTokens => "tokens",
            ResourceType::StorageMb => "MB",
            ResourceType::NetworkRequests => "requests",
            ResourceType::ChainFees => "fee units",
        }
    }

    /// Default quota window applied on first access when no explicit
    /// quota has been configured for an agent
    pub fn default_quota(&self) -> (u64, QuotaPeriod) {
        match self {
            ResourceType::ComputeTime => (3_600_000, QuotaPeriod::Daily),
            ResourceType::InferenceTokens => (1_000_000, QuotaPeriod::Daily),
            ResourceType::StorageMb => (10_240, QuotaPeriod::Monthly),
            ResourceType::NetworkRequests => (100_000, QuotaPeriod::Daily),
            ResourceType::ChainFees => (10_000, QuotaPeriod::Daily),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota window length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPeriod {
    Hourly,
    Daily,
    Monthly,
}

impl QuotaPeriod {
    /// End of the window containing `now`: top of the next hour, next UTC
    /// midnight, or first of the next month at 00:00 UTC. Expired windows
    /// are re-anchored here rather than walked forward period by period.
    pub fn window_end(&self, now: DateTime<Utc>) -> i64 {
        match self {
            QuotaPeriod::Hourly => {
                let secs = now.timestamp();
                secs - secs.rem_euclid(3_600) + 3_600
            }
            QuotaPeriod::Daily => {
                let secs = now.timestamp();
                secs - secs.rem_euclid(86_400) + 86_400
            }
            QuotaPeriod::Monthly => {
                let (year, month) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
                    .single()
                    .map(|dt| dt.timestamp())
                    .unwrap_or_else(|| now.timestamp() + 31 * 86_400)
            }
        }
    }
}

/// One active quota window per (agent, resource)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub agent_id: String,
    pub resource: ResourceType,
    pub limit: u64,
    pub used: u64,
    pub period: QuotaPeriod,
    /// Unix seconds at which the window expires and `used` resets
    pub reset_at: i64,
}

impl ResourceQuota {
    /// Fresh default window for an agent that has never touched this resource
    pub fn new_default(agent_id: &str, resource: ResourceType, now: DateTime<Utc>) -> Self {
        let (limit, period) = resource.default_quota();
        Self {
            agent_id: agent_id.to_string(),
            resource,
            limit,
            used: 0,
            period,
            reset_at: period.window_end(now),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn utilization_percent(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.used as f64 / self.limit as f64 * 100.0
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.reset_at
    }

    /// Reset the window in place: zero usage, advance to the window
    /// containing `now`. Limit and period are preserved.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.used = 0;
        self.reset_at = self.period.window_end(now);
    }
}

/// Immutable ledger row recording one committed allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub resource: ResourceType,
    pub amount: u64,
    /// Per-unit price recorded at allocation time, so window costs are
    /// reproducible by replay even after the price table changes
    pub unit_cost: Usd,
    pub timestamp: i64,
}

impl UsageEvent {
    pub fn total_cost(&self) -> Usd {
        self.unit_cost.mul_units(self.amount)
    }
}

/// Result of a read-only quota check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
    pub remaining: u64,
    /// What the requested amount would cost at current prices
    pub cost: Usd,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Live counters reported by the surrounding application for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUsage {
    pub response_time_ms: f64,
    pub throughput_rpm: f64,
    pub success_count: u64,
    pub error_count: u64,
    /// 0-5 satisfaction signal from user feedback
    pub user_satisfaction: f64,
    pub active_instances: u32,
}

impl AgentUsage {
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            return 100.0;
        }
        self.success_count as f64 / total as f64 * 100.0
    }

    pub fn error_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            return 0.0;
        }
        self.error_count as f64 / total as f64 * 100.0
    }
}

/// Point-in-time metric bundle per agent, assembled by the monitor from
/// quota state, ledger aggregation, and the usage source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub agent_id: String,
    pub timestamp: i64,
    /// Compute-time quota utilization, percent
    pub cpu_percent: f64,
    /// Storage quota utilization, percent
    pub memory_percent: f64,
    /// Inference-token quota utilization, percent
    pub token_percent: f64,
    /// Network-request quota utilization, percent
    pub network_percent: f64,
    /// Chain-fee quota utilization, percent
    pub chain_fee_percent: f64,
    pub response_time_ms: f64,
    pub throughput_rpm: f64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub user_satisfaction: f64,
    pub hourly_cost: Usd,
    pub projected_daily_cost: Usd,
    pub active_instances: u32,
}

impl MetricSnapshot {
    /// Analytics-facing accessor: every tracked metric as an f64 series value
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Memory => self.memory_percent,
            Metric::ResponseTime => self.response_time_ms,
            Metric::Throughput => self.throughput_rpm,
            Metric::SuccessRate => self.success_rate,
            Metric::ErrorRate => self.error_rate,
            Metric::UserSatisfaction => self.user_satisfaction,
            Metric::HourlyCost => self.hourly_cost.as_usd(),
        }
    }
}

/// Metric keys the analytics engine tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
    ResponseTime,
    Throughput,
    SuccessRate,
    ErrorRate,
    UserSatisfaction,
    HourlyCost,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Cpu,
        Metric::Memory,
        Metric::ResponseTime,
        Metric::Throughput,
        Metric::SuccessRate,
        Metric::ErrorRate,
        Metric::UserSatisfaction,
        Metric::HourlyCost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::ResponseTime => "response_time",
            Metric::Throughput => "throughput",
            Metric::SuccessRate => "success_rate",
            Metric::ErrorRate => "error_rate",
            Metric::UserSatisfaction => "user_satisfaction",
            Metric::HourlyCost => "hourly_cost",
        }
    }

    /// Whether larger values are better for this metric
    pub fn higher_is_better(&self) -> bool {
        matches!(
            self,
            Metric::Throughput | Metric::SuccessRate | Metric::UserSatisfaction
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
