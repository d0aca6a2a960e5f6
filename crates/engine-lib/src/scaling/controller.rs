//! Policy evaluation and scaling state
//!
//! Each policy keeps its own cooldown clock, keyed by (agent, policy).
//! A successful action resets that clock; a failed one leaves it
//! untouched so the next evaluation tick may retry. Policies are
//! independent and several may fire for one snapshot.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ScaleExecutor, ScalingAction, ScalingEvent, ScalingPolicy, ScalingState};
use crate::models::MetricSnapshot;

/// Retained scaling events per agent
const MAX_HISTORY: usize = 100;

pub struct ScalingController {
    executor: Arc<dyn ScaleExecutor>,
    policies: DashMap<String, Vec<ScalingPolicy>>,
    states: DashMap<String, ScalingState>,
    /// (agent, policy) -> last successful trigger
    cooldowns: DashMap<(String, String), i64>,
    history: DashMap<String, VecDeque<ScalingEvent>>,
    max_history: usize,
}

impl ScalingController {
    pub fn new(executor: Arc<dyn ScaleExecutor>) -> Self {
        Self {
            executor,
            policies: DashMap::new(),
            states: DashMap::new(),
            cooldowns: DashMap::new(),
            history: DashMap::new(),
            max_history: MAX_HISTORY,
        }
    }

    #[cfg(test)]
    fn with_history_cap(mut self, cap: usize) -> Self {
        self.max_history = cap;
        self
    }

    /// Evaluate every enabled policy for the snapshot's agent. Returns
    /// the events recorded this tick, successes and failures both.
    pub async fn evaluate(&self, snapshot: &MetricSnapshot, now: i64) -> Vec<ScalingEvent> {
        let agent_id = snapshot.agent_id.as_str();
        let policies: Vec<ScalingPolicy> = match self.policies.get(agent_id) {
            Some(list) => list.clone(),
            None => return Vec::new(),
        };

        // Work on a clone so no map guard is held across the executor await
        let mut state = {
            let entry = self
                .states
                .entry(agent_id.to_string())
                .or_insert_with(|| seeded_state(snapshot));
            entry.value().clone()
        };

        let mut events = Vec::new();
        for policy in policies.iter().filter(|p| p.enabled) {
            let observed = snapshot.metric(policy.metric);
            if !observed.is_finite() || !policy.operator.matches(observed, policy.threshold) {
                continue;
            }

            let key = (agent_id.to_string(), policy.id.clone());
            let elapsed = self
                .cooldowns
                .get(&key)
                .map(|last| now - *last >= policy.cooldown_seconds)
                .unwrap_or(true);
            if !elapsed {
                debug!(
                    agent_id,
                    policy_id = %policy.id,
                    "scaling policy matched but is cooling down"
                );
                continue;
            }

            let target = bounded_target(policy.action, &state);
            if target == state.current_instances {
                continue;
            }

            let from = state.current_instances;
            match self.executor.scale(agent_id, from, target).await {
                Ok(()) => {
                    self.cooldowns.insert(key, now);
                    state.current_instances = target;
                    state.target_instances = target;
                    state.last_event_at = Some(now);
                    events.push(event_for(policy, snapshot, now, observed, from, target, None));
                }
                Err(err) => {
                    warn!(
                        agent_id,
                        policy_id = %policy.id,
                        error = %err,
                        "scale executor failed; will retry next tick"
                    );
                    events.push(event_for(
                        policy,
                        snapshot,
                        now,
                        observed,
                        from,
                        target,
                        Some(err.to_string()),
                    ));
                }
            }
        }

        self.states.insert(agent_id.to_string(), state);
        if !events.is_empty() {
            let mut log = self.history.entry(agent_id.to_string()).or_default();
            for event in &events {
                log.push_back(event.clone());
                while log.len() > self.max_history {
                    log.pop_front();
                }
            }
        }
        events
    }

    /// Insert or replace a policy, matched by id
    pub fn upsert_policy(&self, agent_id: &str, policy: ScalingPolicy) {
        let mut list = self.policies.entry(agent_id.to_string()).or_default();
        match list.iter_mut().find(|p| p.id == policy.id) {
            Some(slot) => *slot = policy,
            None => list.push(policy),
        }
    }

    pub fn remove_policy(&self, agent_id: &str, policy_id: &str) -> bool {
        match self.policies.get_mut(agent_id) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|p| p.id != policy_id);
                list.len() < before
            }
            None => false,
        }
    }

    pub fn policies(&self, agent_id: &str) -> Vec<ScalingPolicy> {
        self.policies
            .get(agent_id)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    pub fn state(&self, agent_id: &str) -> Option<ScalingState> {
        self.states.get(agent_id).map(|s| s.clone())
    }

    /// Clamp an agent's instance bounds, creating state if needed
    pub fn set_bounds(&self, agent_id: &str, min_instances: u32, max_instances: u32) {
        let mut state = self
            .states
            .entry(agent_id.to_string())
            .or_insert_with(|| ScalingState::new(agent_id));
        state.min_instances = min_instances.max(1);
        state.max_instances = max_instances.max(state.min_instances);
        state.current_instances = state
            .current_instances
            .clamp(state.min_instances, state.max_instances);
        state.target_instances = state.current_instances;
    }

    /// Most recent events first
    pub fn history(&self, agent_id: &str, limit: usize) -> Vec<ScalingEvent> {
        self.history
            .get(agent_id)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

/// First sighting of an agent adopts its reported instance count
fn seeded_state(snapshot: &MetricSnapshot) -> ScalingState {
    let mut state = ScalingState::new(&snapshot.agent_id);
    let reported = snapshot.active_instances.max(1);
    state.current_instances = reported.clamp(state.min_instances, state.max_instances);
    state.target_instances = state.current_instances;
    state
}

fn bounded_target(action: ScalingAction, state: &ScalingState) -> u32 {
    let raw = match action {
        ScalingAction::ScaleUp => state.current_instances.saturating_add(1),
        ScalingAction::ScaleDown => state.current_instances.saturating_sub(1),
        ScalingAction::ScaleTo(n) => n,
    };
    raw.clamp(state.min_instances, state.max_instances)
}

#[allow(clippy::too_many_arguments)]
fn event_for(
    policy: &ScalingPolicy,
    snapshot: &MetricSnapshot,
    now: i64,
    observed: f64,
    from: u32,
    to: u32,
    error: Option<String>,
) -> ScalingEvent {
    ScalingEvent {
        agent_id: snapshot.agent_id.clone(),
        policy_id: policy.id.clone(),
        timestamp: now,
        metric: policy.metric,
        observed,
        threshold: policy.threshold,
        from_instances: from,
        to_instances: to,
        succeeded: error.is_none(),
        error,
    }
}
