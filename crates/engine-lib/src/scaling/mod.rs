//! Threshold-driven instance scaling
//!
//! This module provides:
//! - Declarative per-agent scaling policies with per-policy cooldowns
//! - Per-agent instance state with min/max bounds
//! - A pluggable async executor seam for the hosting orchestrator
//!
//! The controller decides and records; actually moving instances is the
//! executor's job.

mod controller;

pub use controller::ScalingController;

use crate::models::Metric;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default cooldown between firings of the same policy
pub const DEFAULT_COOLDOWN_SECONDS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOp::Gt => value > threshold,
            ComparisonOp::Gte => value >= threshold,
            ComparisonOp::Lt => value < threshold,
            ComparisonOp::Lte => value <= threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    ScaleTo(u32),
}

/// One declarative rule: when `metric <op> threshold`, apply `action`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub id: String,
    pub metric: Metric,
    pub operator: ComparisonOp,
    pub threshold: f64,
    pub action: ScalingAction,
    pub cooldown_seconds: i64,
    pub enabled: bool,
}

impl ScalingPolicy {
    pub fn new(
        id: impl Into<String>,
        metric: Metric,
        operator: ComparisonOp,
        threshold: f64,
        action: ScalingAction,
    ) -> Self {
        Self {
            id: id.into(),
            metric,
            operator,
            threshold,
            action,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            enabled: true,
        }
    }

    pub fn with_cooldown(mut self, seconds: i64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }
}

/// Instance-count state the controller maintains per agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingState {
    pub agent_id: String,
    pub current_instances: u32,
    pub min_instances: u32,
    pub max_instances: u32,
    pub target_instances: u32,
    pub last_event_at: Option<i64>,
}

impl ScalingState {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            current_instances: 1,
            min_instances: 1,
            max_instances: 10,
            target_instances: 1,
            last_event_at: None,
        }
    }
}

/// Record of one attempted scaling action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingEvent {
    pub agent_id: String,
    pub policy_id: String,
    pub timestamp: i64,
    pub metric: Metric,
    pub observed: f64,
    pub threshold: f64,
    pub from_instances: u32,
    pub to_instances: u32,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Seam to the hosting orchestrator; implementations must be safe to
/// retry, the controller re-attempts on the next evaluation after a
/// failure.
#[async_trait]
pub trait ScaleExecutor: Send + Sync {
    async fn scale(&self, agent_id: &str, from: u32, to: u32) -> anyhow::Result<()>;
}

/// Accepts every request without side effects; the default executor
/// when no orchestrator hook is wired in
pub struct NoopExecutor;

#[async_trait]
impl ScaleExecutor for NoopExecutor {
    async fn scale(&self, _agent_id: &str, _from: u32, _to: u32) -> anyhow::Result<()> {
        Ok(())
    }
}
