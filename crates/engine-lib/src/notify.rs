//! Alert formatting, deduplication, and delivery
//!
//! Alerts are advisory. Delivery is fire-and-forget on a spawned task
//! with a send timeout so a slow sink can never stall a monitor tick,
//! and repeated alerts for the same (agent, kind) are suppressed inside
//! a deduplication window.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default suppression window for repeated alerts
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 3_600;

/// Default sink send timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "info"),
            AlertLevel::Warning => write!(f, "warning"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    BudgetThreshold,
    Anomaly,
    ScalingAction,
    QuotaExhausted,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertKind::BudgetThreshold => "budget_threshold",
            AlertKind::Anomaly => "anomaly",
            AlertKind::ScalingAction => "scaling_action",
            AlertKind::QuotaExhausted => "quota_exhausted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub agent_id: String,
    pub level: AlertLevel,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub timestamp: i64,
    /// Routing and grouping context
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Alert {
    pub fn new(
        agent_id: impl Into<String>,
        level: AlertLevel,
        kind: AlertKind,
        title: impl Into<String>,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            level,
            kind,
            title: title.into(),
            message: message.into(),
            timestamp,
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Delivery seam; the hosting application decides where alerts land
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Writes alerts to the structured log; the default sink
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        match alert.level {
            AlertLevel::Critical => error!(
                event = "alert",
                agent_id = %alert.agent_id,
                kind = %alert.kind,
                title = %alert.title,
                message = %alert.message,
            ),
            AlertLevel::Warning => warn!(
                event = "alert",
                agent_id = %alert.agent_id,
                kind = %alert.kind,
                title = %alert.title,
                message = %alert.message,
            ),
            AlertLevel::Info => info!(
                event = "alert",
                agent_id = %alert.agent_id,
                kind = %alert.kind,
                title = %alert.title,
                message = %alert.message,
            ),
        }
        Ok(())
    }
}

/// Captures alerts in memory; intended for tests
#[derive(Default)]
pub struct MemoryAlertSink {
    alerts: std::sync::Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Alert> {
        match self.alerts.lock() {
            Ok(mut alerts) => std::mem::take(&mut *alerts),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert.clone());
        }
        Ok(())
    }
}

/// Suppresses repeats of the same (agent, kind) inside a window
pub struct AlertDeduper {
    window_secs: i64,
    recent: DashMap<(String, AlertKind), i64>,
}

impl Default for AlertDeduper {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW_SECS)
    }
}

impl AlertDeduper {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            recent: DashMap::new(),
        }
    }

    /// True when the alert should go out; records the emission
    pub fn admit(&self, agent_id: &str, kind: AlertKind, now: i64) -> bool {
        let key = (agent_id.to_string(), kind);
        if let Some(last) = self.recent.get(&key) {
            if now - *last < self.window_secs {
                return false;
            }
        }
        self.recent.insert(key, now);
        self.recent.retain(|_, last| now - *last < self.window_secs);
        true
    }
}

/// Send on a background task, bounded by `send_timeout`. The handle is
/// returned so tests can await completion; production callers drop it.
pub fn dispatch(
    sink: Arc<dyn AlertSink>,
    alert: Alert,
    send_timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::time::timeout(send_timeout, sink.send(&alert)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                event = "alert_delivery_failed",
                agent_id = %alert.agent_id,
                kind = %alert.kind,
                error = %err,
            ),
            Err(_) => warn!(
                event = "alert_delivery_timeout",
                agent_id = %alert.agent_id,
                kind = %alert.kind,
            ),
        }
    })
}
