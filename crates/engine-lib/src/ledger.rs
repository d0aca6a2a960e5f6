//! Append-only usage ledger
//!
//! Every committed allocation lands here as an immutable [`UsageEvent`].
//! The ledger is the source of truth for cost accounting: windowed queries
//! return events in timestamp order, and replaying a window reproduces any
//! previously published cost figure.

use crate::models::UsageEvent;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Pluggable append-only event store
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Record one event. Append is the only mutation the ledger supports.
    async fn append(&self, event: UsageEvent) -> Result<()>;

    /// Events for an agent with `start <= timestamp <= end`, ascending
    async fn query(&self, agent_id: &str, start: i64, end: i64) -> Result<Vec<UsageEvent>>;

    /// Total events recorded for an agent
    async fn count(&self, agent_id: &str) -> Result<usize>;
}

/// In-memory ledger keeping one timestamp-ordered vector per agent
#[derive(Default)]
pub struct MemoryLedger {
    events: DashMap<String, Vec<UsageEvent>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn append(&self, event: UsageEvent) -> Result<()> {
        let mut entry = self.events.entry(event.agent_id.clone()).or_default();
        // Events arrive in near-wall-clock order, but second-resolution
        // timestamps collide; insert before the first later event so the
        // vector stays sorted.
        let at = entry.partition_point(|e| e.timestamp <= event.timestamp);
        entry.insert(at, event);
        Ok(())
    }

    async fn query(&self, agent_id: &str, start: i64, end: i64) -> Result<Vec<UsageEvent>> {
        let Some(entry) = self.events.get(agent_id) else {
            return Ok(Vec::new());
        };
        let lo = entry.partition_point(|e| e.timestamp < start);
        let hi = entry.partition_point(|e| e.timestamp <= end);
        Ok(entry[lo..hi].to_vec())
    }

    async fn count(&self, agent_id: &str) -> Result<usize> {
        Ok(self.events.get(agent_id).map(|v| v.len()).unwrap_or(0))
    }
}
