//! Per-agent resource quotas
//!
//! One active window per (agent, resource). Windows are created lazily on
//! first access, and an expired window resets exactly once on the access
//! that finds it expired; there is no background sweeper. Allocation is
//! check-then-commit under a per-key lock, so concurrent requests can
//! never jointly pass a boundary they jointly violate.

mod manager;
mod store;

#[cfg(test)]
mod tests;

pub use manager::QuotaManager;
pub use store::{MemoryQuotaStore, QuotaStore};

use crate::models::ResourceType;

/// Key identifying one quota window
pub type QuotaKey = (String, ResourceType);
