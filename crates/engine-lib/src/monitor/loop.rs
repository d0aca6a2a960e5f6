//! Periodic monitoring loop
//!
//! Samples the usage source on a fixed cadence, records snapshots,
//! runs anomaly analysis and scaling evaluation per agent, and checks
//! budgets on a slower ticker.

use super::UsageSource;
use crate::analytics::AnomalySeverity;
use crate::engine::MeterEngine;
use crate::health::{components, HealthRegistry};
use crate::models::ResourceType;
use crate::notify::{Alert, AlertKind, AlertLevel};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, info, warn};

/// Configuration for the monitoring loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Snapshot and analysis cadence (default: 60 seconds)
    pub snapshot_interval: Duration,
    /// Budget check cadence (default: 300 seconds)
    pub cost_interval: Duration,
    /// Per-call timeout against the usage source (default: 5 seconds)
    pub source_timeout: Duration,
    /// Trailing window the budget check aggregates over (default: 24 hours)
    pub budget_window_hours: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs(60),
            cost_interval: Duration::from_secs(300),
            source_timeout: Duration::from_secs(5),
            budget_window_hours: 24,
        }
    }
}

/// Monitoring loop that drives snapshots, analytics, scaling, and
/// budget alerts for every agent the source reports
pub struct MonitorLoop {
    /// Live counter source
    source: Arc<dyn UsageSource>,
    /// Engine facade the loop feeds
    engine: Arc<MeterEngine>,
    /// Shared health registry
    health: HealthRegistry,
    /// Configuration
    config: MonitorConfig,
}

impl MonitorLoop {
    pub fn new(
        source: Arc<dyn UsageSource>,
        engine: Arc<MeterEngine>,
        health: HealthRegistry,
        config: MonitorConfig,
    ) -> Self {
        Self {
            source,
            engine,
            health,
            config,
        }
    }

    /// Run until the shutdown signal fires. Cycle bodies complete
    /// before the next tick is drawn, so shutdown is always graceful.
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            snapshot_interval_secs = self.config.snapshot_interval.as_secs(),
            cost_interval_secs = self.config.cost_interval.as_secs(),
            "Starting monitoring loop"
        );

        let mut snapshot_ticker = interval(self.config.snapshot_interval);
        let mut cost_ticker = interval(self.config.cost_interval);
        let mut cycle_count = 0u64;

        loop {
            tokio::select! {
                _ = snapshot_ticker.tick() => {
                    let start = Instant::now();
                    let results = self.snapshot_cycle().await;
                    cycle_count += 1;

                    // Every five minutes at the default interval
                    if cycle_count % 5 == 0 {
                        debug!(
                            agents = results.agents,
                            errors = results.errors,
                            elapsed_ms = start.elapsed().as_millis(),
                            "Snapshot cycle complete"
                        );
                    }
                }
                _ = cost_ticker.tick() => {
                    self.cost_cycle().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down monitoring loop");
                    break;
                }
            }
        }
    }

    /// Sample every reported agent, record snapshots, surface High and
    /// Critical anomalies, and evaluate scaling policies
    async fn snapshot_cycle(&self) -> CycleResults {
        let now = chrono::Utc::now().timestamp();
        let mut results = CycleResults::default();

        let agents = match timeout(self.config.source_timeout, self.source.list_agents()).await {
            Ok(Ok(agents)) => agents,
            Ok(Err(e)) => {
                warn!(error = %e, "Usage source failed to list agents");
                self.source_failed(&e.to_string()).await;
                results.errors += 1;
                return results;
            }
            Err(_) => {
                warn!("Usage source timed out listing agents");
                self.source_failed("timed out listing agents").await;
                results.errors += 1;
                return results;
            }
        };

        // Worst utilization per resource across the fleet
        let mut worst: HashMap<ResourceType, f64> = HashMap::new();

        for agent_id in agents {
            results.agents += 1;

            let usage = match timeout(self.config.source_timeout, self.source.sample(&agent_id))
                .await
            {
                Ok(Ok(usage)) => usage,
                Ok(Err(e)) => {
                    self.engine
                        .logger()
                        .log_source_degraded(&agent_id, &e.to_string());
                    self.engine.metrics().inc_monitor_errors();
                    results.errors += 1;
                    continue;
                }
                Err(_) => {
                    self.engine
                        .logger()
                        .log_source_degraded(&agent_id, "sample timed out");
                    self.engine.metrics().inc_monitor_errors();
                    results.errors += 1;
                    continue;
                }
            };

            let snapshot = match self.engine.observe(&agent_id, &usage, now).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Failed to build snapshot");
                    self.engine.metrics().inc_monitor_errors();
                    results.errors += 1;
                    continue;
                }
            };

            for (resource, percent) in [
                (ResourceType::ComputeTime, snapshot.cpu_percent),
                (ResourceType::StorageMb, snapshot.memory_percent),
                (ResourceType::InferenceTokens, snapshot.token_percent),
                (ResourceType::NetworkRequests, snapshot.network_percent),
                (ResourceType::ChainFees, snapshot.chain_fee_percent),
            ] {
                let entry = worst.entry(resource).or_insert(0.0);
                if percent > *entry {
                    *entry = percent;
                }
            }

            self.surface_anomalies(&agent_id, now);

            if let Err(e) = self.engine.evaluate_scaling(&agent_id).await {
                warn!(agent_id = %agent_id, error = %e, "Scaling evaluation failed");
            }
        }

        for (resource, percent) in &worst {
            self.engine
                .metrics()
                .set_quota_utilization(resource.as_str(), *percent);
        }

        if results.errors == 0 {
            self.health.set_healthy(components::USAGE_SOURCE).await;
        } else {
            self.health
                .set_degraded(
                    components::USAGE_SOURCE,
                    format!("{} sampling errors last cycle", results.errors),
                )
                .await;
        }
        self.health.set_healthy(components::MONITOR).await;

        results
    }

    /// Whole-cycle source failure; nothing could be sampled this tick
    async fn source_failed(&self, reason: &str) {
        self.health
            .set_unhealthy(components::USAGE_SOURCE, reason)
            .await;
        self.engine.metrics().inc_monitor_errors();
    }

    /// Re-analyze the agent and alert on High and Critical anomalies.
    /// The engine's deduper keeps repeat detections quiet.
    fn surface_anomalies(&self, agent_id: &str, now: i64) {
        let report = self.engine.analyze(agent_id);
        let Some(anomaly) = report
            .anomalies
            .iter()
            .find(|a| a.severity >= AnomalySeverity::High)
        else {
            return;
        };

        let level = if anomaly.severity == AnomalySeverity::Critical {
            AlertLevel::Critical
        } else {
            AlertLevel::Warning
        };
        let details = format!(
            "{} expected {:.2}, saw {:.2} (score {:.0})",
            anomaly.detector.as_str(),
            anomaly.expected,
            anomaly.actual,
            anomaly.score
        );

        let admitted = self.engine.alert_deduped(
            Alert::new(
                agent_id,
                level,
                AlertKind::Anomaly,
                format!("{} anomaly", anomaly.metric),
                format!("agent {}: {}", agent_id, details),
                now,
            )
            .with_label("metric", anomaly.metric.as_str())
            .with_label("severity", anomaly.severity.as_str()),
        );
        if admitted {
            self.engine.metrics().inc_anomalies_detected();
            self.engine.logger().log_anomaly(
                agent_id,
                anomaly.metric.as_str(),
                anomaly.severity.as_str(),
                anomaly.score,
                &details,
            );
        }
    }

    /// Check every observed agent's trailing spend against its budget
    async fn cost_cycle(&self) {
        let now = chrono::Utc::now().timestamp();

        for agent_id in self.engine.history().agents() {
            let tracking = match self
                .engine
                .costs(&agent_id, self.config.budget_window_hours)
                .await
            {
                Ok(tracking) => tracking,
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Budget check failed");
                    self.engine.metrics().inc_monitor_errors();
                    continue;
                }
            };
            if !tracking.alert_triggered {
                continue;
            }

            let spent = tracking.total_cost.to_string();
            let budget = tracking.budget_limit.to_string();
            let ratio = if tracking.budget_limit.as_nanos() > 0 {
                tracking.total_cost.as_nanos() as f64 / tracking.budget_limit.as_nanos() as f64
            } else {
                1.0
            };

            let admitted = self.engine.alert_deduped(
                Alert::new(
                    &agent_id,
                    AlertLevel::Warning,
                    AlertKind::BudgetThreshold,
                    "budget threshold crossed",
                    format!(
                        "agent {} spent {} of {} over the last {}h",
                        agent_id, spent, budget, self.config.budget_window_hours
                    ),
                    now,
                )
                .with_label("window_hours", self.config.budget_window_hours.to_string()),
            );
            if admitted {
                self.engine.metrics().inc_budget_alerts();
                self.engine
                    .logger()
                    .log_budget_alert(&agent_id, &spent, &budget, ratio);
            }
        }
    }
}

/// Results from one snapshot cycle
#[derive(Debug, Default)]
struct CycleResults {
    agents: usize,
    errors: usize,
}

/// Builder for the monitoring loop
pub struct MonitorLoopBuilder {
    source: Option<Arc<dyn UsageSource>>,
    engine: Option<Arc<MeterEngine>>,
    health: Option<HealthRegistry>,
    config: MonitorConfig,
}

impl MonitorLoopBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            engine: None,
            health: None,
            config: MonitorConfig::default(),
        }
    }

    /// Set the usage source
    pub fn source(mut self, source: Arc<dyn UsageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the engine facade
    pub fn engine(mut self, engine: Arc<MeterEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Share a health registry with the service surface
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the snapshot cadence
    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.config.snapshot_interval = interval;
        self
    }

    /// Set the budget check cadence
    pub fn cost_interval(mut self, interval: Duration) -> Self {
        self.config.cost_interval = interval;
        self
    }

    /// Set the per-call source timeout
    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.config.source_timeout = timeout;
        self
    }

    /// Set the budget aggregation window
    pub fn budget_window_hours(mut self, hours: i64) -> Self {
        self.config.budget_window_hours = hours;
        self
    }

    /// Build the monitoring loop
    pub fn build(self) -> Result<MonitorLoop> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Usage source is required"))?;
        let engine = self
            .engine
            .ok_or_else(|| anyhow::anyhow!("Engine is required"))?;
        let health = self.health.unwrap_or_default();

        Ok(MonitorLoop::new(source, engine, health, self.config))
    }
}

impl Default for MonitorLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
