//! Live usage monitoring
//!
//! This module provides:
//! - The `UsageSource` seam the hosting platform implements
//! - A default source fed by pushed usage reports
//! - `SnapshotBuilder`: quota views + cost window + live counters
//! - The periodic monitor loop driving analytics, alerts, and scaling

mod r#loop;

pub use r#loop::{MonitorConfig, MonitorLoop, MonitorLoopBuilder};

use crate::cost::CostAccountant;
use crate::error::EngineResult;
use crate::models::{AgentUsage, MetricSnapshot, ResourceType};
use crate::money::Usd;
use crate::quota::QuotaManager;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Live counters for the agents the platform is running
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Agents that should be sampled this cycle
    async fn list_agents(&self) -> anyhow::Result<Vec<String>>;

    /// One agent's live counters
    async fn sample(&self, agent_id: &str) -> anyhow::Result<AgentUsage>;
}

/// Reports older than this drop out of the sampled set
const DEFAULT_STALE_AFTER_SECS: i64 = 600;

/// Default `UsageSource` fed by pushed reports (the service API's
/// usage endpoint lands here). An agent that stops reporting goes
/// stale and silently leaves the monitored set.
pub struct ReportedUsageSource {
    reports: DashMap<String, (AgentUsage, i64)>,
    stale_after_secs: i64,
}

impl Default for ReportedUsageSource {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER_SECS)
    }
}

impl ReportedUsageSource {
    pub fn new(stale_after_secs: i64) -> Self {
        Self {
            reports: DashMap::new(),
            stale_after_secs,
        }
    }

    pub fn report(&self, agent_id: &str, usage: AgentUsage, now: i64) {
        self.reports.insert(agent_id.to_string(), (usage, now));
    }

    fn fresh(&self, reported_at: i64, now: i64) -> bool {
        now - reported_at <= self.stale_after_secs
    }
}

#[async_trait]
impl UsageSource for ReportedUsageSource {
    async fn list_agents(&self) -> anyhow::Result<Vec<String>> {
        let now = chrono::Utc::now().timestamp();
        Ok(self
            .reports
            .iter()
            .filter(|entry| self.fresh(entry.value().1, now))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn sample(&self, agent_id: &str) -> anyhow::Result<AgentUsage> {
        let now = chrono::Utc::now().timestamp();
        match self.reports.get(agent_id) {
            Some(entry) if self.fresh(entry.value().1, now) => Ok(entry.value().0.clone()),
            _ => anyhow::bail!("no fresh usage report for agent {agent_id}"),
        }
    }
}

/// Assembles one MetricSnapshot from the engine's own records plus the
/// sampled live counters
#[derive(Clone)]
pub struct SnapshotBuilder {
    quotas: Arc<QuotaManager>,
    accountant: Arc<CostAccountant>,
}

impl SnapshotBuilder {
    pub fn new(quotas: Arc<QuotaManager>, accountant: Arc<CostAccountant>) -> Self {
        Self { quotas, accountant }
    }

    /// Build a snapshot for `now`. Quota utilizations land in the
    /// percent fields; the trailing hour of ledger spend becomes the
    /// hourly cost and its 24x projection.
    pub async fn build(
        &self,
        agent_id: &str,
        usage: &AgentUsage,
        now: i64,
    ) -> EngineResult<MetricSnapshot> {
        let quotas = self.quotas.list(agent_id).await?;
        let utilization = |resource: ResourceType| {
            quotas
                .iter()
                .find(|q| q.resource == resource)
                .map(|q| q.utilization_percent())
                .unwrap_or(0.0)
        };

        let tracking = self.accountant.aggregate(agent_id, now - 3_600, now).await?;
        let hourly_cost = tracking.total_cost;
        let projected_daily_cost = Usd::from_nanos(hourly_cost.as_nanos().saturating_mul(24));

        Ok(MetricSnapshot {
            agent_id: agent_id.to_string(),
            timestamp: now,
            cpu_percent: utilization(ResourceType::ComputeTime),
            memory_percent: utilization(ResourceType::StorageMb),
            token_percent: utilization(ResourceType::InferenceTokens),
            network_percent: utilization(ResourceType::NetworkRequests),
            chain_fee_percent: utilization(ResourceType::ChainFees),
            response_time_ms: usage.response_time_ms,
            throughput_rpm: usage.throughput_rpm,
            success_rate: usage.success_rate(),
            error_rate: usage.error_rate(),
            user_satisfaction: usage.user_satisfaction,
            hourly_cost,
            projected_daily_cost,
            active_instances: usage.active_instances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{BudgetConfig, PriceTable};
    use crate::ledger::{LedgerStore, MemoryLedger};
    use crate::models::UsageEvent;
    use crate::quota::MemoryQuotaStore;

    fn usage() -> AgentUsage {
        AgentUsage {
            response_time_ms: 420.0,
            throughput_rpm: 75.0,
            success_count: 98,
            error_count: 2,
            user_satisfaction: 4.3,
            active_instances: 2,
        }
    }

    fn builder() -> (SnapshotBuilder, Arc<QuotaManager>, Arc<MemoryLedger>) {
        let store = Arc::new(MemoryQuotaStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let quotas = Arc::new(QuotaManager::new(
            store,
            ledger.clone(),
            PriceTable::default(),
        ));
        let accountant = Arc::new(CostAccountant::new(
            ledger.clone(),
            PriceTable::default(),
            BudgetConfig::default(),
        ));
        (SnapshotBuilder::new(quotas.clone(), accountant), quotas, ledger)
    }

    #[tokio::test]
    async fn test_snapshot_reflects_quota_and_cost() {
        let (builder, quotas, _ledger) = builder();
        let now = chrono::Utc::now().timestamp();

        // 300k of the 1M default token quota, costing 2000 nano-USD each
        quotas
            .allocate("agent-1", ResourceType::InferenceTokens, 300_000, None)
            .await
            .unwrap();

        let snapshot = builder.build("agent-1", &usage(), now).await.unwrap();
        assert!((snapshot.token_percent - 30.0).abs() < 1e-9);
        assert!((snapshot.cpu_percent - 0.0).abs() < 1e-9);
        assert_eq!(snapshot.hourly_cost, Usd::from_nanos(300_000 * 2_000));
        assert_eq!(
            snapshot.projected_daily_cost,
            Usd::from_nanos(300_000 * 2_000 * 24)
        );
        assert!((snapshot.success_rate - 98.0).abs() < 1e-9);
        assert!((snapshot.error_rate - 2.0).abs() < 1e-9);
        assert_eq!(snapshot.active_instances, 2);
    }

    #[tokio::test]
    async fn test_snapshot_cost_window_is_one_hour() {
        let (builder, _quotas, ledger) = builder();
        let now = chrono::Utc::now().timestamp();

        // One event inside the hour, one outside
        for (offset, id) in [(-600, "evt-in"), (-7_200, "evt-out")] {
            ledger
                .append(UsageEvent {
                    id: id.to_string(),
                    agent_id: "agent-1".to_string(),
                    task_id: None,
                    resource: ResourceType::NetworkRequests,
                    amount: 100,
                    unit_cost: Usd::from_nanos(500),
                    timestamp: now + offset,
                })
                .await
                .unwrap();
        }

        let snapshot = builder.build("agent-1", &usage(), now).await.unwrap();
        assert_eq!(snapshot.hourly_cost, Usd::from_nanos(100 * 500));
    }

    #[tokio::test]
    async fn test_reported_source_staleness() {
        let source = ReportedUsageSource::new(600);
        let now = chrono::Utc::now().timestamp();
        source.report("agent-live", usage(), now);
        source.report("agent-stale", usage(), now - 700);

        let agents = source.list_agents().await.unwrap();
        assert_eq!(agents, vec!["agent-live".to_string()]);

        assert!(source.sample("agent-live").await.is_ok());
        assert!(source.sample("agent-stale").await.is_err());
        assert!(source.sample("agent-unknown").await.is_err());
    }
}
