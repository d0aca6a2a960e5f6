//! Observability infrastructure for the metering engine
//!
//! Provides:
//! - Prometheus metrics (allocation latency, analysis latency, rejection and alert totals)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, GaugeVec, Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct EngineMetricsInner {
    allocation_latency_seconds: Histogram,
    analysis_latency_seconds: Histogram,
    allocations: IntGauge,
    quota_rejections: IntGauge,
    validation_errors: IntGauge,
    anomalies_detected: IntGauge,
    scaling_actions: IntGauge,
    scaling_failures: IntGauge,
    budget_alerts: IntGauge,
    monitor_errors: IntGauge,
    agents_tracked: IntGauge,
    snapshots_buffered: IntGauge,
    quota_utilization_percent: GaugeVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            allocation_latency_seconds: register_histogram!(
                "metering_engine_allocation_latency_seconds",
                "Time spent deciding and committing one allocation request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register allocation_latency_seconds"),

            analysis_latency_seconds: register_histogram!(
                "metering_engine_analysis_latency_seconds",
                "Time spent producing one analysis report",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            allocations: register_int_gauge!(
                "metering_engine_allocations_total",
                "Total number of committed allocations"
            )
            .expect("Failed to register allocations_total"),

            quota_rejections: register_int_gauge!(
                "metering_engine_quota_rejections_total",
                "Total number of allocations rejected for exceeding a quota"
            )
            .expect("Failed to register quota_rejections_total"),

            validation_errors: register_int_gauge!(
                "metering_engine_validation_errors_total",
                "Total number of malformed requests rejected before any quota check"
            )
            .expect("Failed to register validation_errors_total"),

            anomalies_detected: register_int_gauge!(
                "metering_engine_anomalies_detected_total",
                "Total number of anomalies surfaced by analysis"
            )
            .expect("Failed to register anomalies_detected_total"),

            scaling_actions: register_int_gauge!(
                "metering_engine_scaling_actions_total",
                "Total number of successful scaling actions"
            )
            .expect("Failed to register scaling_actions_total"),

            scaling_failures: register_int_gauge!(
                "metering_engine_scaling_failures_total",
                "Total number of scaling actions the executor failed to apply"
            )
            .expect("Failed to register scaling_failures_total"),

            budget_alerts: register_int_gauge!(
                "metering_engine_budget_alerts_total",
                "Total number of budget threshold alerts raised"
            )
            .expect("Failed to register budget_alerts_total"),

            monitor_errors: register_int_gauge!(
                "metering_engine_monitor_errors_total",
                "Total number of monitor cycles degraded by a failing usage source"
            )
            .expect("Failed to register monitor_errors_total"),

            agents_tracked: register_int_gauge!(
                "metering_engine_agents_tracked",
                "Number of agents seen in the most recent monitor cycle"
            )
            .expect("Failed to register agents_tracked"),

            snapshots_buffered: register_int_gauge!(
                "metering_engine_snapshots_buffered",
                "Number of metric snapshots currently retained in memory"
            )
            .expect("Failed to register snapshots_buffered"),

            quota_utilization_percent: register_gauge_vec!(
                "metering_engine_quota_utilization_percent",
                "Worst-case quota utilization across agents, per resource",
                &["resource"]
            )
            .expect("Failed to register quota_utilization_percent"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        // Initialize global metrics on first call
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record how long one allocation decision took
    pub fn observe_allocation_latency(&self, duration_secs: f64) {
        self.inner().allocation_latency_seconds.observe(duration_secs);
    }

    /// Record how long one analysis report took
    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    pub fn inc_allocations(&self) {
        self.inner().allocations.inc();
    }

    pub fn inc_quota_rejections(&self) {
        self.inner().quota_rejections.inc();
    }

    pub fn inc_validation_errors(&self) {
        self.inner().validation_errors.inc();
    }

    pub fn inc_anomalies_detected(&self) {
        self.inner().anomalies_detected.inc();
    }

    pub fn inc_scaling_actions(&self) {
        self.inner().scaling_actions.inc();
    }

    pub fn inc_scaling_failures(&self) {
        self.inner().scaling_failures.inc();
    }

    pub fn inc_budget_alerts(&self) {
        self.inner().budget_alerts.inc();
    }

    pub fn inc_monitor_errors(&self) {
        self.inner().monitor_errors.inc();
    }

    /// Update fleet-level gauges after a monitor cycle
    pub fn set_fleet_size(&self, agents: i64, snapshots: i64) {
        self.inner().agents_tracked.set(agents);
        self.inner().snapshots_buffered.set(snapshots);
    }

    /// Record the worst utilization seen for one resource this cycle
    pub fn set_quota_utilization(&self, resource: &str, percent: f64) {
        self.inner()
            .quota_utilization_percent
            .with_label_values(&[resource])
            .set(percent);
    }
}

/// Structured logger for engine events
///
/// Provides consistent JSON-formatted logging for allocations,
/// anomalies, scaling decisions, and other significant events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance_name: String,
}

impl StructuredLogger {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
        }
    }

    /// Log a committed allocation
    pub fn log_allocation(&self, agent_id: &str, resource: &str, amount: u64, cost: &str) {
        info!(
            event = "allocation_committed",
            instance = %self.instance_name,
            agent_id = %agent_id,
            resource = %resource,
            amount = amount,
            cost = %cost,
            "Allocation committed"
        );
    }

    /// Log an allocation rejected at the quota boundary
    pub fn log_quota_rejection(&self, agent_id: &str, resource: &str, requested: u64, remaining: u64) {
        warn!(
            event = "quota_rejected",
            instance = %self.instance_name,
            agent_id = %agent_id,
            resource = %resource,
            requested = requested,
            remaining = remaining,
            "Allocation rejected: quota exhausted"
        );
    }

    /// Log a budget threshold crossing
    pub fn log_budget_alert(&self, agent_id: &str, spent: &str, budget: &str, ratio: f64) {
        warn!(
            event = "budget_alert",
            instance = %self.instance_name,
            agent_id = %agent_id,
            spent = %spent,
            budget = %budget,
            ratio = ratio,
            "Agent spend crossed the budget alert threshold"
        );
    }

    /// Log an anomaly surfaced by analysis
    pub fn log_anomaly(
        &self,
        agent_id: &str,
        metric: &str,
        severity: &str,
        score: f64,
        details: &str,
    ) {
        match severity {
            "critical" => {
                warn!(
                    event = "anomaly_detected",
                    instance = %self.instance_name,
                    agent_id = %agent_id,
                    metric = %metric,
                    severity = %severity,
                    score = score,
                    details = %details,
                    "Critical anomaly detected"
                );
            }
            _ => {
                info!(
                    event = "anomaly_detected",
                    instance = %self.instance_name,
                    agent_id = %agent_id,
                    metric = %metric,
                    severity = %severity,
                    score = score,
                    details = %details,
                    "Anomaly detected"
                );
            }
        }
    }

    /// Log a scaling attempt, successful or not
    pub fn log_scaling_action(
        &self,
        agent_id: &str,
        policy_id: &str,
        from_instances: u32,
        to_instances: u32,
        succeeded: bool,
    ) {
        if succeeded {
            info!(
                event = "scaling_action",
                instance = %self.instance_name,
                agent_id = %agent_id,
                policy_id = %policy_id,
                from_instances = from_instances,
                to_instances = to_instances,
                "Scaling action applied"
            );
        } else {
            warn!(
                event = "scaling_action_failed",
                instance = %self.instance_name,
                agent_id = %agent_id,
                policy_id = %policy_id,
                from_instances = from_instances,
                to_instances = to_instances,
                "Scaling action failed, will retry next tick"
            );
        }
    }

    /// Log a usage source failing for one agent's cycle
    pub fn log_source_degraded(&self, agent_id: &str, error: &str) {
        warn!(
            event = "usage_source_degraded",
            instance = %self.instance_name,
            agent_id = %agent_id,
            error = %error,
            "Usage source failed for this agent; cycle skipped"
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "engine_started",
            instance = %self.instance_name,
            engine_version = %version,
            "Metering engine started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            instance = %self.instance_name,
            reason = %reason,
            "Metering engine shutting down"
        );
    }
}
