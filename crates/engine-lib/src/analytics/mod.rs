//! Performance analytics over metric snapshot windows
//!
//! This module provides:
//! - Trend fitting (direction, per-minute change rate, confidence)
//! - Anomaly detection (z-score, spike, seasonal) merged per timestamp
//! - Benchmark scoring and cross-agent ranking
//!
//! Everything here is a pure function of the snapshot window it is
//! handed; no state is kept between calls.

mod anomaly;
mod score;
mod stats;
mod trend;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalySeverity, DetectorKind};
pub use score::{AgentRank, Benchmark, MetricScore, PerformanceScore, PerformanceScorer};
pub use trend::{Trend, TrendAnalyzer, TrendDirection};

use crate::models::{Metric, MetricSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extract one metric's (timestamp, value) series from a snapshot
/// window, dropping non-finite values so a single bad reading cannot
/// poison the detectors.
pub fn series_of(metric: Metric, snapshots: &[MetricSnapshot]) -> Vec<(i64, f64)> {
    snapshots
        .iter()
        .map(|s| (s.timestamp, s.metric(metric)))
        .filter(|&(_, v)| v.is_finite())
        .collect()
}

/// Full analytical picture of one agent over one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub agent_id: String,
    pub generated_at: i64,
    pub samples: usize,
    pub trends: Vec<Trend>,
    /// Sorted by severity, then score, most urgent first
    pub anomalies: Vec<Anomaly>,
    pub score: PerformanceScore,
}

/// Bundles the analyzers behind one entry point
#[derive(Default)]
pub struct AnalyticsEngine {
    trends: TrendAnalyzer,
    anomalies: AnomalyDetector,
    scorer: PerformanceScorer,
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze one agent's window: a trend per tracked metric, merged
    /// anomalies across all of them, and a benchmark score.
    pub fn analyze(&self, agent_id: &str, snapshots: &[MetricSnapshot]) -> AnalysisReport {
        let mut trends = Vec::with_capacity(Metric::ALL.len());
        let mut anomalies = Vec::new();

        for metric in Metric::ALL {
            let series = series_of(metric, snapshots);
            trends.push(self.trends.analyze(metric, &series));
            anomalies.extend(self.anomalies.detect(metric, &series));
        }

        anomalies.sort_by(|a, b| {
            b.severity.cmp(&a.severity).then_with(|| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        AnalysisReport {
            agent_id: agent_id.to_string(),
            generated_at: chrono::Utc::now().timestamp(),
            samples: snapshots.len(),
            trends,
            anomalies,
            score: self.scorer.score(agent_id, snapshots),
        }
    }

    /// Comparative ranking over per-agent windows; see
    /// [`PerformanceScorer::rank`] for the exclusion rule.
    pub fn rank(
        &self,
        windows: &[(String, Vec<MetricSnapshot>)],
        previous_ranks: &HashMap<String, u32>,
    ) -> Vec<AgentRank> {
        self.scorer.rank(windows, previous_ranks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Usd;

    fn window(n: usize) -> Vec<MetricSnapshot> {
        (0..n)
            .map(|i| MetricSnapshot {
                agent_id: "agent-7".to_string(),
                timestamp: 1_700_000_000 + i as i64 * 60,
                cpu_percent: 50.0 + i as f64,
                memory_percent: 40.0,
                token_percent: 15.0,
                network_percent: 5.0,
                chain_fee_percent: 0.0,
                response_time_ms: if i + 1 == n { 2_000.0 } else { 200.0 },
                throughput_rpm: 70.0,
                success_rate: 99.0,
                error_rate: 1.0,
                user_satisfaction: 4.1,
                hourly_cost: Usd::from_usd(0.8),
                projected_daily_cost: Usd::from_usd(19.2),
                active_instances: 1,
            })
            .collect()
    }

    #[test]
    fn test_analyze_covers_every_metric() {
        let engine = AnalyticsEngine::new();
        let report = engine.analyze("agent-7", &window(30));

        assert_eq!(report.trends.len(), Metric::ALL.len());
        assert_eq!(report.samples, 30);
        assert_eq!(report.score.samples, 30);

        let cpu_trend = report
            .trends
            .iter()
            .find(|t| t.metric == Metric::Cpu)
            .unwrap();
        assert_eq!(cpu_trend.direction, TrendDirection::Increasing);
    }

    #[test]
    fn test_analyze_surfaces_merged_anomaly_first() {
        let engine = AnalyticsEngine::new();
        let report = engine.analyze("agent-7", &window(30));

        // The response-time outlier in the final sample trips both the
        // z-score and spike detectors; merged it must appear once
        let response: Vec<_> = report
            .anomalies
            .iter()
            .filter(|a| a.metric == Metric::ResponseTime)
            .collect();
        assert_eq!(response.len(), 1);
        assert!(response[0].severity >= AnomalySeverity::High);
        assert_eq!(report.anomalies[0].severity, response[0].severity);
    }

    #[test]
    fn test_empty_window_degrades_gracefully() {
        let engine = AnalyticsEngine::new();
        let report = engine.analyze("agent-7", &[]);

        assert_eq!(report.trends.len(), Metric::ALL.len());
        assert!(report.trends.iter().all(|t| t.samples == 0));
        assert!(report.anomalies.is_empty());
        assert_eq!(report.score.samples, 0);
        assert!(report.score.overall >= 0.0);
    }

    #[test]
    fn test_series_of_drops_non_finite_values() {
        let mut snapshots = window(3);
        snapshots[1].cpu_percent = f64::NAN;
        let series = series_of(Metric::Cpu, &snapshots);
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|&(_, v)| v.is_finite()));
    }
}
