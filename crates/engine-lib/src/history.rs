//! Bounded in-memory retention of metric snapshots
//!
//! One ring per agent, trimmed by both length and age so an abandoned
//! agent cannot pin a day of stale samples forever.

use crate::models::MetricSnapshot;
use dashmap::DashMap;
use std::collections::VecDeque;

/// Default ring size: one day of minutely snapshots
const MAX_SNAPSHOTS: usize = 1_440;

/// Default retention window
const RETENTION_SECS: i64 = 86_400;

pub struct SnapshotHistory {
    rings: DashMap<String, VecDeque<MetricSnapshot>>,
    max_len: usize,
    retention_secs: i64,
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new(MAX_SNAPSHOTS, RETENTION_SECS)
    }
}

impl SnapshotHistory {
    pub fn new(max_len: usize, retention_secs: i64) -> Self {
        Self {
            rings: DashMap::new(),
            max_len: max_len.max(1),
            retention_secs,
        }
    }

    /// Append a snapshot, dropping anything aged out of the retention
    /// window relative to the newest sample
    pub fn push(&self, snapshot: MetricSnapshot) {
        let cutoff = snapshot.timestamp - self.retention_secs;
        let mut ring = self.rings.entry(snapshot.agent_id.clone()).or_default();
        while ring.front().map(|s| s.timestamp < cutoff).unwrap_or(false) {
            ring.pop_front();
        }
        ring.push_back(snapshot);
        while ring.len() > self.max_len {
            ring.pop_front();
        }
    }

    pub fn latest(&self, agent_id: &str) -> Option<MetricSnapshot> {
        self.rings
            .get(agent_id)
            .and_then(|ring| ring.back().cloned())
    }

    /// Snapshots with `start <= timestamp <= end`, in insertion order
    pub fn window(&self, agent_id: &str, start: i64, end: i64) -> Vec<MetricSnapshot> {
        self.rings
            .get(agent_id)
            .map(|ring| {
                ring.iter()
                    .filter(|s| s.timestamp >= start && s.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent `n` snapshots, oldest first
    pub fn recent(&self, agent_id: &str, n: usize) -> Vec<MetricSnapshot> {
        self.rings
            .get(agent_id)
            .map(|ring| {
                let skip = ring.len().saturating_sub(n);
                ring.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn all(&self, agent_id: &str) -> Vec<MetricSnapshot> {
        self.rings
            .get(agent_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn agents(&self) -> Vec<String> {
        self.rings.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self, agent_id: &str) -> usize {
        self.rings.get(agent_id).map(|ring| ring.len()).unwrap_or(0)
    }

    pub fn total_len(&self) -> usize {
        self.rings.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}
