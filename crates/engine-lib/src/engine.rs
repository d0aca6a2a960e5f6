//! Engine facade
//!
//! `MeterEngine` wires the quota manager, ledger, cost accountant,
//! analytics, advisor, and scaling controller behind one surface. All
//! collaborators are injected through `EngineBuilder`; in-memory
//! defaults make a self-contained engine for tests and single-node
//! deployments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dashmap::DashMap;

use crate::advisor::{OptimizationAdvisor, Recommendation};
use crate::analytics::{AgentRank, AnalysisReport, AnalyticsEngine};
use crate::cost::{BudgetConfig, CostAccountant, CostTracking, PriceTable};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerStore, MemoryLedger};
use crate::models::{
    AgentUsage, CheckResult, MetricSnapshot, ResourceQuota, ResourceType, UsageEvent,
};
use crate::monitor::SnapshotBuilder;
use crate::notify::{self, Alert, AlertDeduper, AlertKind, AlertLevel, AlertSink, LogAlertSink};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::quota::{MemoryQuotaStore, QuotaManager, QuotaStore};
use crate::scaling::{
    NoopExecutor, ScaleExecutor, ScalingController, ScalingEvent, ScalingPolicy, ScalingState,
};
use crate::history::SnapshotHistory;

pub struct MeterEngine {
    quotas: Arc<QuotaManager>,
    accountant: Arc<CostAccountant>,
    snapshots: SnapshotBuilder,
    analytics: AnalyticsEngine,
    advisor: OptimizationAdvisor,
    scaling: Arc<ScalingController>,
    history: Arc<SnapshotHistory>,
    sink: Arc<dyn AlertSink>,
    deduper: AlertDeduper,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    previous_ranks: DashMap<String, u32>,
    alert_timeout: Duration,
}

impl MeterEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Read-only admission check; commits nothing
    pub async fn check_quota(
        &self,
        agent_id: &str,
        resource: ResourceType,
        amount: i64,
    ) -> EngineResult<CheckResult> {
        let result = self.quotas.check(agent_id, resource, amount).await;
        if matches!(result, Err(EngineError::Validation(_))) {
            self.metrics.inc_validation_errors();
        }
        result
    }

    /// Check-then-commit allocation; the quota manager guarantees the
    /// window limit is never overshot
    pub async fn allocate(
        &self,
        agent_id: &str,
        resource: ResourceType,
        amount: i64,
        task_id: Option<String>,
    ) -> EngineResult<UsageEvent> {
        let start = Instant::now();
        let result = self.quotas.allocate(agent_id, resource, amount, task_id).await;
        self.metrics
            .observe_allocation_latency(start.elapsed().as_secs_f64());

        match &result {
            Ok(event) => {
                self.metrics.inc_allocations();
                self.logger.log_allocation(
                    agent_id,
                    resource.as_str(),
                    event.amount,
                    &event.total_cost().to_string(),
                );
            }
            Err(EngineError::QuotaExceeded {
                agent_id,
                resource,
                requested,
                remaining,
            }) => {
                self.metrics.inc_quota_rejections();
                self.logger
                    .log_quota_rejection(agent_id, resource.as_str(), *requested, *remaining);
                let now = chrono::Utc::now().timestamp();
                self.alert_deduped(
                    Alert::new(
                        agent_id,
                        AlertLevel::Warning,
                        AlertKind::QuotaExhausted,
                        format!("{} quota exhausted", resource),
                        format!(
                            "agent {} requested {} {} with only {} remaining in the window",
                            agent_id,
                            requested,
                            resource.unit(),
                            remaining
                        ),
                        now,
                    )
                    .with_label("resource", resource.as_str()),
                );
            }
            Err(EngineError::Validation(_)) => self.metrics.inc_validation_errors(),
            Err(_) => {}
        }
        result
    }

    /// Latest recorded snapshot, if the agent has been observed
    pub fn get_metrics(&self, agent_id: &str) -> Option<MetricSnapshot> {
        self.history.latest(agent_id)
    }

    /// Build a snapshot from live counters and record it
    pub async fn observe(
        &self,
        agent_id: &str,
        usage: &AgentUsage,
        now: i64,
    ) -> EngineResult<MetricSnapshot> {
        let snapshot = self.snapshots.build(agent_id, usage, now).await?;
        self.record_snapshot(snapshot.clone());
        Ok(snapshot)
    }

    /// Record an externally built snapshot
    pub fn record_snapshot(&self, snapshot: MetricSnapshot) {
        self.history.push(snapshot);
        self.metrics.set_fleet_size(
            self.history.agents().len() as i64,
            self.history.total_len() as i64,
        );
    }

    /// Analyze the stored history; a thin window yields a degenerate
    /// report rather than an error
    pub fn analyze(&self, agent_id: &str) -> AnalysisReport {
        let snapshots = self.history.all(agent_id);
        self.analyze_history(agent_id, &snapshots)
    }

    /// Pure analysis path over a caller-supplied window
    pub fn analyze_history(
        &self,
        agent_id: &str,
        snapshots: &[MetricSnapshot],
    ) -> AnalysisReport {
        let start = Instant::now();
        let report = self.analytics.analyze(agent_id, snapshots);
        self.metrics
            .observe_analysis_latency(start.elapsed().as_secs_f64());
        report
    }

    pub fn recommend(&self, agent_id: &str) -> Vec<Recommendation> {
        self.advisor.recommend(&self.analyze(agent_id))
    }

    /// Evaluate scaling policies against the latest snapshot
    pub async fn evaluate_scaling(&self, agent_id: &str) -> EngineResult<Vec<ScalingEvent>> {
        let snapshot = self
            .history
            .latest(agent_id)
            .ok_or(EngineError::InsufficientData { have: 0, need: 1 })?;
        let now = chrono::Utc::now().timestamp();
        let events = self.scaling.evaluate(&snapshot, now).await;

        for event in &events {
            if event.succeeded {
                self.metrics.inc_scaling_actions();
            } else {
                self.metrics.inc_scaling_failures();
            }
            self.logger.log_scaling_action(
                &event.agent_id,
                &event.policy_id,
                event.from_instances,
                event.to_instances,
                event.succeeded,
            );
            let (level, title) = if event.succeeded {
                (AlertLevel::Info, "scaling action applied")
            } else {
                (AlertLevel::Warning, "scaling action failed")
            };
            self.alert(
                Alert::new(
                    &event.agent_id,
                    level,
                    AlertKind::ScalingAction,
                    title,
                    format!(
                        "policy {} moved instances {} -> {} on {} = {:.1}",
                        event.policy_id,
                        event.from_instances,
                        event.to_instances,
                        event.metric,
                        event.observed
                    ),
                    event.timestamp,
                )
                .with_label("policy_id", &event.policy_id),
            );
        }
        Ok(events)
    }

    /// Replayed spend over the trailing `hours`
    pub async fn costs(&self, agent_id: &str, hours: i64) -> EngineResult<CostTracking> {
        let now = chrono::Utc::now().timestamp();
        let start = now - hours.max(1) * 3_600;
        Ok(self.accountant.aggregate(agent_id, start, now).await?)
    }

    /// Effective quota windows for every resource
    pub async fn quotas(&self, agent_id: &str) -> EngineResult<Vec<ResourceQuota>> {
        self.quotas.list(agent_id).await
    }

    pub async fn set_limit(
        &self,
        agent_id: &str,
        resource: ResourceType,
        limit: u64,
    ) -> EngineResult<ResourceQuota> {
        self.quotas.set_limit(agent_id, resource, limit).await
    }

    pub fn upsert_scaling_policy(&self, agent_id: &str, policy: ScalingPolicy) {
        self.scaling.upsert_policy(agent_id, policy);
    }

    pub fn remove_scaling_policy(&self, agent_id: &str, policy_id: &str) -> bool {
        self.scaling.remove_policy(agent_id, policy_id)
    }

    pub fn scaling_policies(&self, agent_id: &str) -> Vec<ScalingPolicy> {
        self.scaling.policies(agent_id)
    }

    pub fn scaling_state(&self, agent_id: &str) -> Option<ScalingState> {
        self.scaling.state(agent_id)
    }

    pub fn scaling_history(&self, agent_id: &str, limit: usize) -> Vec<ScalingEvent> {
        self.scaling.history(agent_id, limit)
    }

    /// Rank observed agents over the trailing window. Deltas compare
    /// against the previous call's ranking.
    pub fn rank_agents(&self, window_secs: i64) -> Vec<AgentRank> {
        let now = chrono::Utc::now().timestamp();
        let windows: Vec<(String, Vec<MetricSnapshot>)> = self
            .history
            .agents()
            .into_iter()
            .map(|agent_id| {
                let window = self.history.window(&agent_id, now - window_secs, now);
                (agent_id, window)
            })
            .collect();

        let previous: HashMap<String, u32> = self
            .previous_ranks
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();

        let ranks = self.analytics.rank(&windows, &previous);
        self.previous_ranks.clear();
        for rank in &ranks {
            self.previous_ranks.insert(rank.agent_id.clone(), rank.rank);
        }
        ranks
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Fire-and-forget alert delivery
    pub(crate) fn alert(&self, alert: Alert) {
        let _handle = notify::dispatch(self.sink.clone(), alert, self.alert_timeout);
    }

    /// Alert unless the same (agent, kind) fired inside the dedup
    /// window; returns whether it went out
    pub(crate) fn alert_deduped(&self, alert: Alert) -> bool {
        if self.deduper.admit(&alert.agent_id, alert.kind, alert.timestamp) {
            self.alert(alert);
            true
        } else {
            false
        }
    }
}

/// Dependency-injection builder; every collaborator has an in-memory
/// default
pub struct EngineBuilder {
    quota_store: Option<Arc<dyn QuotaStore>>,
    ledger: Option<Arc<dyn LedgerStore>>,
    prices: PriceTable,
    budget: BudgetConfig,
    executor: Option<Arc<dyn ScaleExecutor>>,
    sink: Option<Arc<dyn AlertSink>>,
    history: Option<Arc<SnapshotHistory>>,
    instance_name: String,
    alert_dedup_secs: i64,
    alert_timeout: Duration,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            quota_store: None,
            ledger: None,
            prices: PriceTable::default(),
            budget: BudgetConfig::default(),
            executor: None,
            sink: None,
            history: None,
            instance_name: "metering-engine".to_string(),
            alert_dedup_secs: notify::DEFAULT_DEDUP_WINDOW_SECS,
            alert_timeout: notify::DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn quota_store(mut self, store: Arc<dyn QuotaStore>) -> Self {
        self.quota_store = Some(store);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    pub fn budget(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }

    pub fn scale_executor(mut self, executor: Arc<dyn ScaleExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn snapshot_history(mut self, history: Arc<SnapshotHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    pub fn alert_dedup_window(mut self, secs: i64) -> Self {
        self.alert_dedup_secs = secs;
        self
    }

    pub fn build(self) -> MeterEngine {
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(MemoryLedger::new()));
        let quota_store = self
            .quota_store
            .unwrap_or_else(|| Arc::new(MemoryQuotaStore::new()));
        let executor = self.executor.unwrap_or_else(|| Arc::new(NoopExecutor));
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogAlertSink));
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(SnapshotHistory::default()));

        let quotas = Arc::new(QuotaManager::new(
            quota_store,
            ledger.clone(),
            self.prices.clone(),
        ));
        let accountant = Arc::new(CostAccountant::new(ledger, self.prices, self.budget));
        let snapshots = SnapshotBuilder::new(quotas.clone(), accountant.clone());

        MeterEngine {
            quotas,
            accountant,
            snapshots,
            analytics: AnalyticsEngine::new(),
            advisor: OptimizationAdvisor::new(),
            scaling: Arc::new(ScalingController::new(executor)),
            history,
            sink,
            deduper: AlertDeduper::new(self.alert_dedup_secs),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new(self.instance_name),
            previous_ranks: DashMap::new(),
            alert_timeout: self.alert_timeout,
        }
    }
}
