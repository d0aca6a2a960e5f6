//! Benchmark-based performance scoring and agent ranking
//!
//! Each metric's mean over the window is scored against a three-tier
//! benchmark, component scores average their constituent metrics, and
//! the overall score is a fixed weighted sum clamped to [0, 100].

use crate::models::{Metric, MetricSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::series_of;
use super::stats::mean;

/// Component weights; must sum to 1.0
const WEIGHT_EFFICIENCY: f64 = 0.25;
const WEIGHT_RELIABILITY: f64 = 0.25;
const WEIGHT_QUALITY: f64 = 0.25;
const WEIGHT_SCALABILITY: f64 = 0.15;
const WEIGHT_COST: f64 = 0.10;

/// Agents with fewer snapshots than this are excluded from ranking
const MIN_RANK_SAMPLES: usize = 5;

/// Three reference levels for one metric, in the metric's own units
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Benchmark {
    pub excellent: f64,
    pub target: f64,
    pub baseline: f64,
}

impl Benchmark {
    /// Platform defaults, tuned for conversational agents
    pub fn for_metric(metric: Metric) -> Benchmark {
        let (excellent, target, baseline) = match metric {
            Metric::Cpu => (30.0, 50.0, 70.0),
            Metric::Memory => (40.0, 60.0, 80.0),
            Metric::ResponseTime => (200.0, 500.0, 1_000.0),
            Metric::Throughput => (100.0, 60.0, 30.0),
            Metric::SuccessRate => (99.5, 98.0, 95.0),
            Metric::ErrorRate => (0.5, 2.0, 5.0),
            Metric::UserSatisfaction => (4.5, 4.0, 3.5),
            Metric::HourlyCost => (0.5, 2.0, 5.0),
        };
        Benchmark {
            excellent,
            target,
            baseline,
        }
    }

    /// Score a raw value: 100 at excellent, 85 at target, 70 at
    /// baseline, linear between tiers, decaying toward 0 past baseline.
    pub fn score(&self, metric: Metric, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let scored = if metric.higher_is_better() {
            self.score_ascending(value)
        } else {
            self.score_descending(value)
        };
        scored.clamp(0.0, 100.0)
    }

    fn score_ascending(&self, value: f64) -> f64 {
        if value >= self.excellent {
            100.0
        } else if value >= self.target {
            85.0 + 15.0 * ratio(value - self.target, self.excellent - self.target)
        } else if value >= self.baseline {
            70.0 + 15.0 * ratio(value - self.baseline, self.target - self.baseline)
        } else if self.baseline > 0.0 {
            70.0 * (value / self.baseline)
        } else {
            0.0
        }
    }

    fn score_descending(&self, value: f64) -> f64 {
        if value <= self.excellent {
            100.0
        } else if value <= self.target {
            85.0 + 15.0 * ratio(self.target - value, self.target - self.excellent)
        } else if value <= self.baseline {
            70.0 + 15.0 * ratio(self.baseline - value, self.baseline - self.target)
        } else if self.baseline > 0.0 {
            // Twice the baseline scores zero
            70.0 * (2.0 - value / self.baseline)
        } else {
            0.0
        }
    }
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom.abs() < f64::EPSILON {
        // Collapsed tier: sit at the tier floor
        0.0
    } else {
        (num / denom).clamp(0.0, 1.0)
    }
}

/// One metric's contribution to a performance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: Metric,
    /// Mean raw value over the scored window
    pub value: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceScore {
    pub agent_id: String,
    pub overall: f64,
    pub efficiency: f64,
    pub reliability: f64,
    pub quality: f64,
    pub scalability: f64,
    pub cost_effectiveness: f64,
    pub metric_scores: Vec<MetricScore>,
    pub samples: usize,
}

/// One row of a comparative ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRank {
    pub agent_id: String,
    pub overall: f64,
    /// 1-based position, 1 is best
    pub rank: u32,
    /// Previous rank minus current rank; positive means the agent moved up
    pub rank_delta: Option<i64>,
}

/// Scores agents against a benchmark table
pub struct PerformanceScorer {
    benchmarks: HashMap<Metric, Benchmark>,
    min_rank_samples: usize,
}

impl Default for PerformanceScorer {
    fn default() -> Self {
        let benchmarks = Metric::ALL
            .iter()
            .map(|&m| (m, Benchmark::for_metric(m)))
            .collect();
        Self {
            benchmarks,
            min_rank_samples: MIN_RANK_SAMPLES,
        }
    }
}

impl PerformanceScorer {
    pub fn with_benchmark(mut self, metric: Metric, benchmark: Benchmark) -> Self {
        self.benchmarks.insert(metric, benchmark);
        self
    }

    /// Score one agent's snapshot window
    pub fn score(&self, agent_id: &str, snapshots: &[MetricSnapshot]) -> PerformanceScore {
        let mut raw: HashMap<Metric, f64> = HashMap::new();
        let mut metric_scores = Vec::with_capacity(Metric::ALL.len());

        for metric in Metric::ALL {
            let series = series_of(metric, snapshots);
            let values: Vec<f64> = series.iter().map(|&(_, v)| v).collect();
            let value = if values.is_empty() {
                f64::NAN
            } else {
                mean(&values)
            };
            let score = self
                .benchmarks
                .get(&metric)
                .map(|b| b.score(metric, value))
                .unwrap_or(0.0);
            raw.insert(metric, score);
            metric_scores.push(MetricScore {
                metric,
                value,
                score,
            });
        }

        let of = |m: Metric| raw.get(&m).copied().unwrap_or(0.0);
        let efficiency = (of(Metric::Cpu) + of(Metric::Memory)) / 2.0;
        let reliability = (of(Metric::SuccessRate) + of(Metric::ErrorRate)) / 2.0;
        let quality = (of(Metric::ResponseTime) + of(Metric::UserSatisfaction)) / 2.0;
        let scalability = (of(Metric::Cpu) + of(Metric::Throughput)) / 2.0;
        let cost_effectiveness = of(Metric::HourlyCost);

        let overall = (efficiency * WEIGHT_EFFICIENCY
            + reliability * WEIGHT_RELIABILITY
            + quality * WEIGHT_QUALITY
            + scalability * WEIGHT_SCALABILITY
            + cost_effectiveness * WEIGHT_COST)
            .clamp(0.0, 100.0);

        PerformanceScore {
            agent_id: agent_id.to_string(),
            overall,
            efficiency,
            reliability,
            quality,
            scalability,
            cost_effectiveness,
            metric_scores,
            samples: snapshots.len(),
        }
    }

    /// Rank agents over a shared window. Agents with fewer than five
    /// snapshots are left out rather than scored with a default. Deltas
    /// come from the caller's previous ranking, if any.
    pub fn rank(
        &self,
        windows: &[(String, Vec<MetricSnapshot>)],
        previous_ranks: &HashMap<String, u32>,
    ) -> Vec<AgentRank> {
        let mut scored: Vec<PerformanceScore> = windows
            .iter()
            .filter(|(_, snapshots)| snapshots.len() >= self.min_rank_samples)
            .map(|(agent_id, snapshots)| self.score(agent_id, snapshots))
            .collect();

        scored.sort_by(|a, b| {
            b.overall
                .partial_cmp(&a.overall)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(i, score)| {
                let rank = (i + 1) as u32;
                let rank_delta = previous_ranks
                    .get(&score.agent_id)
                    .map(|&prev| prev as i64 - rank as i64);
                AgentRank {
                    agent_id: score.agent_id,
                    overall: score.overall,
                    rank,
                    rank_delta,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Usd;

    fn snapshot(agent_id: &str, ts: i64, cpu: f64, response_ms: f64) -> MetricSnapshot {
        MetricSnapshot {
            agent_id: agent_id.to_string(),
            timestamp: ts,
            cpu_percent: cpu,
            memory_percent: 40.0,
            token_percent: 10.0,
            network_percent: 10.0,
            chain_fee_percent: 0.0,
            response_time_ms: response_ms,
            throughput_rpm: 80.0,
            success_rate: 99.0,
            error_rate: 1.0,
            user_satisfaction: 4.2,
            hourly_cost: Usd::from_usd(1.0),
            projected_daily_cost: Usd::from_usd(24.0),
            active_instances: 2,
        }
    }

    fn window(agent_id: &str, n: usize, cpu: f64, response_ms: f64) -> Vec<MetricSnapshot> {
        (0..n)
            .map(|i| snapshot(agent_id, 1_700_000_000 + i as i64 * 60, cpu, response_ms))
            .collect()
    }

    #[test]
    fn test_benchmark_tiers() {
        let b = Benchmark::for_metric(Metric::Cpu);
        assert!((b.score(Metric::Cpu, 20.0) - 100.0).abs() < 1e-9);
        assert!((b.score(Metric::Cpu, 30.0) - 100.0).abs() < 1e-9);
        assert!((b.score(Metric::Cpu, 50.0) - 85.0).abs() < 1e-9);
        assert!((b.score(Metric::Cpu, 70.0) - 70.0).abs() < 1e-9);
        // Midway between target and baseline
        assert!((b.score(Metric::Cpu, 60.0) - 77.5).abs() < 1e-9);
        // Past baseline decays linearly and twice-baseline hits zero
        assert!((b.score(Metric::Cpu, 105.0) - 35.0).abs() < 1e-9);
        assert!((b.score(Metric::Cpu, 140.0)).abs() < 1e-9);
        assert!((b.score(Metric::Cpu, 500.0)).abs() < 1e-9);
    }

    #[test]
    fn test_benchmark_ascending_direction() {
        let b = Benchmark::for_metric(Metric::SuccessRate);
        assert!((b.score(Metric::SuccessRate, 100.0) - 100.0).abs() < 1e-9);
        assert!((b.score(Metric::SuccessRate, 98.0) - 85.0).abs() < 1e-9);
        assert!((b.score(Metric::SuccessRate, 95.0) - 70.0).abs() < 1e-9);
        let floor = b.score(Metric::SuccessRate, 40.0);
        assert!(floor < 70.0 && floor >= 0.0);
    }

    #[test]
    fn test_overall_stays_in_bounds_at_extremes() {
        let scorer = PerformanceScorer::default();

        let perfect = scorer.score("agent-a", &window("agent-a", 10, 10.0, 100.0));
        assert!(perfect.overall <= 100.0);
        assert!(perfect.overall > 90.0);

        let awful: Vec<MetricSnapshot> = (0..10)
            .map(|i| {
                let mut s = snapshot("agent-b", 1_700_000_000 + i * 60, 100.0, 30_000.0);
                s.memory_percent = 100.0;
                s.throughput_rpm = 0.0;
                s.success_rate = 0.0;
                s.error_rate = 100.0;
                s.user_satisfaction = 0.0;
                s.hourly_cost = Usd::from_usd(50.0);
                s
            })
            .collect();
        let bottom = scorer.score("agent-b", &awful);
        assert!(bottom.overall >= 0.0);
        assert!(bottom.overall < 20.0);
    }

    #[test]
    fn test_component_weights_sum_to_one() {
        let total = WEIGHT_EFFICIENCY
            + WEIGHT_RELIABILITY
            + WEIGHT_QUALITY
            + WEIGHT_SCALABILITY
            + WEIGHT_COST;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_reports_metric_breakdown() {
        let scorer = PerformanceScorer::default();
        let score = scorer.score("agent-a", &window("agent-a", 8, 45.0, 400.0));
        assert_eq!(score.metric_scores.len(), Metric::ALL.len());
        assert_eq!(score.samples, 8);
        let cpu = score
            .metric_scores
            .iter()
            .find(|m| m.metric == Metric::Cpu)
            .unwrap();
        assert!((cpu.value - 45.0).abs() < 1e-9);
        assert!(cpu.score > 85.0 && cpu.score < 100.0);
    }

    #[test]
    fn test_ranking_excludes_thin_windows() {
        let scorer = PerformanceScorer::default();
        let windows = vec![
            ("agent-a".to_string(), window("agent-a", 6, 20.0, 200.0)),
            ("agent-b".to_string(), window("agent-b", 6, 90.0, 5_000.0)),
            ("agent-c".to_string(), window("agent-c", 3, 10.0, 100.0)),
        ];
        let ranks = scorer.rank(&windows, &HashMap::new());
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks[0].agent_id, "agent-a");
        assert_eq!(ranks[0].rank, 1);
        assert_eq!(ranks[1].agent_id, "agent-b");
        assert_eq!(ranks[1].rank, 2);
        assert!(ranks.iter().all(|r| r.rank_delta.is_none()));
    }

    #[test]
    fn test_rank_delta_against_previous_ranking() {
        let scorer = PerformanceScorer::default();
        let windows = vec![
            ("agent-a".to_string(), window("agent-a", 6, 20.0, 200.0)),
            ("agent-b".to_string(), window("agent-b", 6, 90.0, 5_000.0)),
        ];
        let mut previous = HashMap::new();
        previous.insert("agent-a".to_string(), 2u32);
        previous.insert("agent-b".to_string(), 1u32);

        let ranks = scorer.rank(&windows, &previous);
        assert_eq!(ranks[0].agent_id, "agent-a");
        assert_eq!(ranks[0].rank_delta, Some(1));
        assert_eq!(ranks[1].agent_id, "agent-b");
        assert_eq!(ranks[1].rank_delta, Some(-1));
    }
}
