//! Pluggable quota persistence

use crate::models::{ResourceQuota, ResourceType};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use super::QuotaKey;

/// Backing store for quota windows. Implementations only persist and
/// fetch; all window semantics (defaults, resets, limit checks) live in
/// [`super::QuotaManager`].
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn load(&self, agent_id: &str, resource: ResourceType)
        -> Result<Option<ResourceQuota>>;

    async fn save(&self, quota: ResourceQuota) -> Result<()>;

    /// Every persisted window for an agent, in no particular order
    async fn list(&self, agent_id: &str) -> Result<Vec<ResourceQuota>>;
}

/// In-memory store keyed by (agent, resource)
#[derive(Default)]
pub struct MemoryQuotaStore {
    quotas: DashMap<QuotaKey, ResourceQuota>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn load(
        &self,
        agent_id: &str,
        resource: ResourceType,
    ) -> Result<Option<ResourceQuota>> {
        Ok(self
            .quotas
            .get(&(agent_id.to_string(), resource))
            .map(|q| q.clone()))
    }

    async fn save(&self, quota: ResourceQuota) -> Result<()> {
        self.quotas
            .insert((quota.agent_id.clone(), quota.resource), quota);
        Ok(())
    }

    async fn list(&self, agent_id: &str) -> Result<Vec<ResourceQuota>> {
        Ok(self
            .quotas
            .iter()
            .filter(|entry| entry.key().0 == agent_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
