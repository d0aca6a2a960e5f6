//! Quota window lifecycle and atomic allocation

use crate::cost::PriceTable;
use crate::error::{EngineError, EngineResult};
use crate::ledger::LedgerStore;
use crate::models::{CheckResult, ResourceQuota, ResourceType, UsageEvent};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{QuotaKey, QuotaStore};

/// Enforces per-agent quota windows and commits usage events.
///
/// Every mutation of a window happens under that window's own async lock,
/// held across the whole read-modify-write (including the ledger append),
/// so the check-then-commit sequence is atomic per (agent, resource)
/// regardless of the backing store.
pub struct QuotaManager {
    store: Arc<dyn QuotaStore>,
    ledger: Arc<dyn LedgerStore>,
    prices: PriceTable,
    locks: DashMap<QuotaKey, Arc<Mutex<()>>>,
    event_seq: AtomicU64,
}

impl QuotaManager {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        ledger: Arc<dyn LedgerStore>,
        prices: PriceTable,
    ) -> Self {
        Self {
            store,
            ledger,
            prices,
            locks: DashMap::new(),
            event_seq: AtomicU64::new(0),
        }
    }

    /// Read-only admission check against the effective window view.
    /// Persists nothing: a missing window is judged as its default, an
    /// expired one as freshly reset.
    pub async fn check(
        &self,
        agent_id: &str,
        resource: ResourceType,
        amount: i64,
    ) -> EngineResult<CheckResult> {
        let amount = validate_amount(agent_id, amount)?;
        let quota = self.effective(agent_id, resource, Utc::now()).await?;

        let remaining = quota.remaining();
        let cost = self.prices.cost_of(resource, amount);
        if amount <= remaining {
            Ok(CheckResult {
                allowed: true,
                remaining,
                cost,
                reason: None,
            })
        } else {
            Ok(CheckResult {
                allowed: false,
                remaining,
                cost,
                reason: Some(format!(
                    "would exceed {} quota: requested {}, remaining {}",
                    resource, amount, remaining
                )),
            })
        }
    }

    /// Check, commit, and record one allocation atomically.
    ///
    /// On success the window's `used` is incremented and a [`UsageEvent`]
    /// is appended to the ledger before the lock is released. A breach
    /// returns [`EngineError::QuotaExceeded`] with nothing committed
    /// (though a window reset observed on the way in does persist).
    pub async fn allocate(
        &self,
        agent_id: &str,
        resource: ResourceType,
        amount: i64,
        task_id: Option<String>,
    ) -> EngineResult<UsageEvent> {
        let amount = validate_amount(agent_id, amount)?;

        let lock = self.lock_for(agent_id, resource);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut quota = match self.store.load(agent_id, resource).await? {
            Some(q) => q,
            None => ResourceQuota::new_default(agent_id, resource, now),
        };

        let mut reset_observed = false;
        if quota.is_expired(now.timestamp()) {
            quota.reset(now);
            reset_observed = true;
        }

        if amount > quota.remaining() {
            // The reset is real even though the allocation is refused
            if reset_observed {
                self.store.save(quota.clone()).await?;
            }
            debug!(
                agent_id,
                resource = %resource,
                requested = amount,
                remaining = quota.remaining(),
                "allocation rejected"
            );
            return Err(EngineError::QuotaExceeded {
                agent_id: agent_id.to_string(),
                resource,
                requested: amount,
                remaining: quota.remaining(),
            });
        }

        quota.used += amount;
        self.store.save(quota.clone()).await?;

        let event = UsageEvent {
            id: self.next_event_id(now),
            agent_id: agent_id.to_string(),
            task_id,
            resource,
            amount,
            unit_cost: self.prices.unit_cost(resource),
            timestamp: now.timestamp(),
        };

        if let Err(e) = self.ledger.append(event.clone()).await {
            // Keep window and ledger consistent: back out the increment
            quota.used = quota.used.saturating_sub(amount);
            self.store.save(quota).await?;
            return Err(EngineError::Store(e));
        }

        debug!(
            agent_id,
            resource = %resource,
            amount,
            used = quota.used,
            limit = quota.limit,
            "allocation committed"
        );
        Ok(event)
    }

    /// Fetch the window, materializing the default and persisting a
    /// pending reset. This is the mutating read.
    pub async fn get(&self, agent_id: &str, resource: ResourceType) -> EngineResult<ResourceQuota> {
        let lock = self.lock_for(agent_id, resource);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut dirty = false;
        let mut quota = match self.store.load(agent_id, resource).await? {
            Some(q) => q,
            None => {
                dirty = true;
                ResourceQuota::new_default(agent_id, resource, now)
            }
        };
        if quota.is_expired(now.timestamp()) {
            quota.reset(now);
            dirty = true;
        }
        if dirty {
            self.store.save(quota.clone()).await?;
        }
        Ok(quota)
    }

    /// Non-mutating effective view, for snapshots and API reads
    pub async fn view(
        &self,
        agent_id: &str,
        resource: ResourceType,
    ) -> EngineResult<ResourceQuota> {
        Ok(self.effective(agent_id, resource, Utc::now()).await?)
    }

    /// Effective views for every resource category
    pub async fn list(&self, agent_id: &str) -> EngineResult<Vec<ResourceQuota>> {
        let now = Utc::now();
        let mut quotas = Vec::with_capacity(ResourceType::ALL.len());
        for resource in ResourceType::ALL {
            quotas.push(self.effective(agent_id, resource, now).await?);
        }
        Ok(quotas)
    }

    /// Replace the window's limit, preserving current usage. Feedback
    /// path for operators and the scaling loop.
    pub async fn set_limit(
        &self,
        agent_id: &str,
        resource: ResourceType,
        limit: u64,
    ) -> EngineResult<ResourceQuota> {
        let lock = self.lock_for(agent_id, resource);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut quota = match self.store.load(agent_id, resource).await? {
            Some(q) => q,
            None => ResourceQuota::new_default(agent_id, resource, now),
        };
        if quota.is_expired(now.timestamp()) {
            quota.reset(now);
        }
        quota.limit = limit;
        self.store.save(quota.clone()).await?;
        Ok(quota)
    }

    /// The window as an admission decision would see it right now
    async fn effective(
        &self,
        agent_id: &str,
        resource: ResourceType,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ResourceQuota> {
        let mut quota = match self.store.load(agent_id, resource).await? {
            Some(q) => q,
            None => ResourceQuota::new_default(agent_id, resource, now),
        };
        if quota.is_expired(now.timestamp()) {
            quota.reset(now);
        }
        Ok(quota)
    }

    fn lock_for(&self, agent_id: &str, resource: ResourceType) -> Arc<Mutex<()>> {
        self.locks
            .entry((agent_id.to_string(), resource))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn next_event_id(&self, now: DateTime<Utc>) -> String {
        let seq = self.event_seq.fetch_add(1, Ordering::Relaxed);
        format!("evt-{}-{:06}", now.timestamp_millis(), seq)
    }
}

fn validate_amount(agent_id: &str, amount: i64) -> EngineResult<u64> {
    if agent_id.is_empty() {
        return Err(EngineError::Validation("agent id must not be empty".into()));
    }
    if amount <= 0 {
        return Err(EngineError::Validation(format!(
            "allocation amount must be positive, got {}",
            amount
        )));
    }
    Ok(amount as u64)
}
