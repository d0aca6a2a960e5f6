//! Anomaly detection over metric series
//!
//! Three independent detectors run per metric:
//!
//! 1. global z-score: the latest value against the whole window
//! 2. spike pattern: the last ten samples against the ten before them
//! 3. seasonal: the latest value against its hour-of-day history
//!
//! Candidates landing on the same (metric, timestamp) are merged
//! conservatively: strongest severity wins and scores take the max,
//! never a sum. A failure to read one metric's series never blocks the
//! others, since callers pass pre-filtered finite series.

use crate::models::Metric;
use chrono::{DateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::stats::{mean, std_dev};

/// Default z-score sensitivity (standard deviations)
const DEFAULT_SENSITIVITY: f64 = 2.0;

/// Minimum series length for the global z-score detector
const MIN_SAMPLES: usize = 10;

/// Samples per side of the spike comparison
const SPIKE_WINDOW: usize = 10;

/// Minimum series length for the seasonal detector
const SEASONAL_MIN_SAMPLES: usize = 100;

/// Minimum prior observations in an hour bucket before it is typical
const SEASONAL_MIN_BUCKET: usize = 3;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Info,
    Warning,
    High,
    Critical,
}

impl AnomalySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalySeverity::Info => "info",
            AnomalySeverity::Warning => "warning",
            AnomalySeverity::High => "high",
            AnomalySeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which detector produced an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    GlobalZScore,
    SpikePattern,
    Seasonal,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::GlobalZScore => "global_z_score",
            DetectorKind::SpikePattern => "spike_pattern",
            DetectorKind::Seasonal => "seasonal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub metric: Metric,
    pub timestamp: i64,
    pub severity: AnomalySeverity,
    /// 0-100, scaled from how far past the sensitivity the value landed
    pub score: f64,
    pub expected: f64,
    pub actual: f64,
    pub deviation: f64,
    pub detector: DetectorKind,
    pub recommendations: Vec<String>,
}

/// Stateless detector bundle; every call recomputes from the series
pub struct AnomalyDetector {
    sensitivity: f64,
    min_samples: usize,
    spike_window: usize,
    seasonal_min_samples: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            min_samples: MIN_SAMPLES,
            spike_window: SPIKE_WINDOW,
            seasonal_min_samples: SEASONAL_MIN_SAMPLES,
        }
    }
}

impl AnomalyDetector {
    pub fn new(sensitivity: f64) -> Self {
        Self {
            sensitivity,
            ..Self::default()
        }
    }

    /// Run all detectors over one metric's series and merge the
    /// candidates. Returns anomalies in timestamp order.
    pub fn detect(&self, metric: Metric, series: &[(i64, f64)]) -> Vec<Anomaly> {
        let mut candidates = Vec::new();
        if let Some(anomaly) = self.global_zscore(metric, series) {
            candidates.push(anomaly);
        }
        candidates.extend(self.spike_pattern(metric, series));
        if let Some(anomaly) = self.seasonal(metric, series) {
            candidates.push(anomaly);
        }
        merge(candidates)
    }

    /// Latest value against the mean and deviation of the whole window
    fn global_zscore(&self, metric: Metric, series: &[(i64, f64)]) -> Option<Anomaly> {
        if series.len() < self.min_samples {
            return None;
        }
        let values: Vec<f64> = series.iter().map(|&(_, v)| v).collect();
        let m = mean(&values);
        let sd = std_dev(&values);
        if sd < f64::EPSILON {
            return None;
        }

        let &(timestamp, actual) = series.last()?;
        let z = (actual - m) / sd;
        if z.abs() <= self.sensitivity {
            return None;
        }

        Some(Anomaly {
            metric,
            timestamp,
            severity: self.severity_for(z.abs()),
            score: self.score_for(z.abs()),
            expected: m,
            actual,
            deviation: (actual - m).abs(),
            detector: DetectorKind::GlobalZScore,
            recommendations: remediation(metric),
        })
    }

    /// Mean of the last ten samples against the ten before them; recent
    /// points deviating from the earlier mean by more than twice that
    /// gap are flagged.
    fn spike_pattern(&self, metric: Metric, series: &[(i64, f64)]) -> Vec<Anomaly> {
        let window = self.spike_window;
        if series.len() < 2 * window {
            return Vec::new();
        }

        let split = series.len() - window;
        let before: Vec<f64> = series[split - window..split].iter().map(|&(_, v)| v).collect();
        let recent = &series[split..];

        let before_mean = mean(&before);
        let recent_mean = mean(&recent.iter().map(|&(_, v)| v).collect::<Vec<_>>());
        let gap = (recent_mean - before_mean).abs();
        if gap < 1e-9 {
            // Equal means: no regime shift to measure against
            return Vec::new();
        }

        let threshold = 2.0 * gap;
        recent
            .iter()
            .filter_map(|&(timestamp, actual)| {
                let deviation = (actual - before_mean).abs();
                if deviation <= threshold {
                    return None;
                }
                let severity = if deviation > 4.0 * gap {
                    AnomalySeverity::Critical
                } else {
                    AnomalySeverity::High
                };
                Some(Anomaly {
                    metric,
                    timestamp,
                    severity,
                    score: (deviation / threshold * 50.0).min(100.0),
                    expected: before_mean,
                    actual,
                    deviation,
                    detector: DetectorKind::SpikePattern,
                    recommendations: remediation(metric),
                })
            })
            .collect()
    }

    /// Latest value against the typical value for its hour of day
    fn seasonal(&self, metric: Metric, series: &[(i64, f64)]) -> Option<Anomaly> {
        if series.len() < self.seasonal_min_samples {
            return None;
        }

        let &(timestamp, actual) = series.last()?;
        let hour = hour_of(timestamp)?;

        let bucket: Vec<f64> = series[..series.len() - 1]
            .iter()
            .filter(|&&(ts, _)| hour_of(ts) == Some(hour))
            .map(|&(_, v)| v)
            .collect();
        if bucket.len() < SEASONAL_MIN_BUCKET {
            return None;
        }

        let typical = mean(&bucket);
        let sd = std_dev(&bucket);
        if sd < f64::EPSILON {
            return None;
        }

        let z = (actual - typical) / sd;
        if z.abs() <= self.sensitivity {
            return None;
        }

        Some(Anomaly {
            metric,
            timestamp,
            severity: self.severity_for(z.abs()),
            score: self.score_for(z.abs()),
            expected: typical,
            actual,
            deviation: (actual - typical).abs(),
            detector: DetectorKind::Seasonal,
            recommendations: remediation(metric),
        })
    }

    fn severity_for(&self, z_abs: f64) -> AnomalySeverity {
        if z_abs > 2.0 * self.sensitivity {
            AnomalySeverity::Critical
        } else {
            AnomalySeverity::High
        }
    }

    fn score_for(&self, z_abs: f64) -> f64 {
        (z_abs / self.sensitivity * 50.0).min(100.0)
    }
}

fn hour_of(timestamp: i64) -> Option<u32> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.hour())
}

/// Collapse candidates per timestamp: strongest severity wins, scores
/// take the max
fn merge(candidates: Vec<Anomaly>) -> Vec<Anomaly> {
    let mut merged: HashMap<i64, Anomaly> = HashMap::new();
    for candidate in candidates {
        match merged.entry(candidate.timestamp) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                let kept = slot.get_mut();
                kept.score = kept.score.max(candidate.score);
                if candidate.severity > kept.severity {
                    let score = kept.score;
                    *kept = candidate;
                    kept.score = score;
                }
            }
        }
    }
    let mut out: Vec<Anomaly> = merged.into_values().collect();
    out.sort_by_key(|a| a.timestamp);
    out
}

fn remediation(metric: Metric) -> Vec<String> {
    let suggestions: &[&str] = match metric {
        Metric::Cpu => &[
            "Profile the agent's hot paths",
            "Raise the compute quota or add an instance if load is legitimate",
        ],
        Metric::Memory => &["Audit storage growth and prune stale artifacts"],
        Metric::ResponseTime => &[
            "Check downstream dependency latency",
            "Inspect queue depth before scaling",
        ],
        Metric::Throughput => &["Verify upstream demand; a collapse here often precedes errors"],
        Metric::SuccessRate => &["Correlate with recent deployments and roll back if aligned"],
        Metric::ErrorRate => &["Inspect recent error logs for a common failure signature"],
        Metric::UserSatisfaction => &["Review recent conversations flagged by low ratings"],
        Metric::HourlyCost => &[
            "Audit the usage mix for an unexpected resource",
            "Consider a cheaper model tier for background tasks",
        ],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}
