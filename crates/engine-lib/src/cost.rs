//! Cost accounting over the usage ledger
//!
//! Aggregation replays ledger events with each event's recorded unit
//! price, so a window total is reproducible long after the live price
//! table has changed. Budget alerts computed here are advisory: they
//! flag spend, they never block an allocation.

use crate::ledger::LedgerStore;
use crate::models::ResourceType;
use crate::money::Usd;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-unit prices in nano-USD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    prices: HashMap<ResourceType, Usd>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut prices = HashMap::new();
        // compute: ~$0.11 per compute-hour
        prices.insert(ResourceType::ComputeTime, Usd::from_nanos(30));
        // tokens: $2 per million
        prices.insert(ResourceType::InferenceTokens, Usd::from_nanos(2_000));
        // storage: $0.10 per GB
        prices.insert(ResourceType::StorageMb, Usd::from_nanos(100_000));
        // network: $0.50 per million requests
        prices.insert(ResourceType::NetworkRequests, Usd::from_nanos(500));
        // chain fees: $0.001 per fee unit
        prices.insert(ResourceType::ChainFees, Usd::from_nanos(1_000_000));
        Self { prices }
    }
}

impl PriceTable {
    /// Current per-unit price for a resource
    pub fn unit_cost(&self, resource: ResourceType) -> Usd {
        self.prices.get(&resource).copied().unwrap_or(Usd::ZERO)
    }

    pub fn set_unit_cost(&mut self, resource: ResourceType, price: Usd) {
        self.prices.insert(resource, price);
    }

    /// What `amount` units would cost at current prices
    pub fn cost_of(&self, resource: ResourceType, amount: u64) -> Usd {
        self.unit_cost(resource).mul_units(amount)
    }
}

/// Budget limits with per-agent overrides
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub default_limit: Usd,
    /// Fraction of the limit at which the advisory alert fires
    pub alert_threshold: f64,
    overrides: HashMap<String, Usd>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_limit: Usd::from_usd(100.0),
            alert_threshold: 0.8,
            overrides: HashMap::new(),
        }
    }
}

impl BudgetConfig {
    pub fn new(default_limit: Usd, alert_threshold: f64) -> Self {
        Self {
            default_limit,
            alert_threshold,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, agent_id: impl Into<String>, limit: Usd) -> Self {
        self.overrides.insert(agent_id.into(), limit);
        self
    }

    pub fn limit_for(&self, agent_id: &str) -> Usd {
        self.overrides
            .get(agent_id)
            .copied()
            .unwrap_or(self.default_limit)
    }
}

/// One resource's line in a cost breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLine {
    pub resource: ResourceType,
    pub amount: u64,
    pub cost: Usd,
}

/// Aggregated spend for one agent over a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTracking {
    pub agent_id: String,
    pub period_start: i64,
    pub period_end: i64,
    pub by_resource: Vec<CostLine>,
    pub total_cost: Usd,
    pub budget_limit: Usd,
    pub alert_threshold: f64,
    /// Recomputed on every aggregation, never latched
    pub alert_triggered: bool,
    pub event_count: usize,
}

/// Replays ledger windows into cost figures
pub struct CostAccountant {
    ledger: Arc<dyn LedgerStore>,
    prices: PriceTable,
    budget: BudgetConfig,
}

impl CostAccountant {
    pub fn new(ledger: Arc<dyn LedgerStore>, prices: PriceTable, budget: BudgetConfig) -> Self {
        Self {
            ledger,
            prices,
            budget,
        }
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    /// Sum the window `[start, end]` using each event's recorded unit
    /// price. Idempotent: the same window always yields the same figures.
    pub async fn aggregate(&self, agent_id: &str, start: i64, end: i64) -> Result<CostTracking> {
        let events = self.ledger.query(agent_id, start, end).await?;

        let mut amounts: HashMap<ResourceType, (u64, Usd)> = HashMap::new();
        for event in &events {
            let entry = amounts.entry(event.resource).or_insert((0, Usd::ZERO));
            entry.0 = entry.0.saturating_add(event.amount);
            entry.1 += event.total_cost();
        }

        // Stable breakdown order regardless of arrival order
        let by_resource: Vec<CostLine> = ResourceType::ALL
            .iter()
            .filter_map(|&resource| {
                amounts.get(&resource).map(|&(amount, cost)| CostLine {
                    resource,
                    amount,
                    cost,
                })
            })
            .collect();

        let total_cost: Usd = by_resource.iter().map(|line| line.cost).sum();
        let budget_limit = self.budget.limit_for(agent_id);
        let alert_threshold = self.budget.alert_threshold;
        let alert_triggered = total_cost > budget_limit.scale(alert_threshold);

        Ok(CostTracking {
            agent_id: agent_id.to_string(),
            period_start: start,
            period_end: end,
            by_resource,
            total_cost,
            budget_limit,
            alert_threshold,
            alert_triggered,
            event_count: events.len(),
        })
    }
}
