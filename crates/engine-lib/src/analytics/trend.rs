//! Metric trend analysis
//!
//! Fits a least-squares line through a metric series and classifies the
//! direction. The x axis is minutes since the window start, so
//! `change_rate` reads as metric units per minute. Confidence is the
//! fit's R² on a 0-100 scale; a short series gets a degenerate stable
//! trend with zero confidence rather than an error.

use super::stats::{linear_fit, std_dev};
use crate::models::Metric;
use serde::{Deserialize, Serialize};

/// Minimum samples before a fit is attempted
const MIN_SAMPLES: usize = 10;

/// Slope magnitude (units/minute) below which a series counts as flat
const STABLE_SLOPE: f64 = 0.01;

/// Trailing samples inspected for volatility
const VOLATILITY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Volatile,
}

/// Fitted trend for one metric over one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub metric: Metric,
    pub direction: TrendDirection,
    /// Metric units per minute
    pub change_rate: f64,
    /// 0-100, clamp(R² x 100)
    pub confidence: f64,
    pub samples: usize,
    /// Fitted value at the end of the window; prediction anchor
    pub level: f64,
}

impl Trend {
    /// Extrapolate the fitted line
    pub fn predict(&self, minutes_ahead: f64) -> f64 {
        self.level + self.change_rate * minutes_ahead
    }

    fn insufficient(metric: Metric, samples: usize, level: f64) -> Self {
        Self {
            metric,
            direction: TrendDirection::Stable,
            change_rate: 0.0,
            confidence: 0.0,
            samples,
            level,
        }
    }
}

/// Recomputes trends from scratch on every call; holds no series state
pub struct TrendAnalyzer {
    min_samples: usize,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES,
        }
    }
}

impl TrendAnalyzer {
    pub fn new(min_samples: usize) -> Self {
        Self { min_samples }
    }

    /// Analyze a (timestamp, value) series, pre-filtered to finite values
    /// and ordered by timestamp.
    pub fn analyze(&self, metric: Metric, series: &[(i64, f64)]) -> Trend {
        let last_value = series.last().map(|&(_, v)| v).unwrap_or(0.0);
        if series.len() < self.min_samples.max(2) {
            return Trend::insufficient(metric, series.len(), last_value);
        }

        let t0 = series[0].0;
        let points: Vec<(f64, f64)> = series
            .iter()
            .map(|&(ts, v)| ((ts - t0) as f64 / 60.0, v))
            .collect();

        let Some(fit) = linear_fit(&points) else {
            return Trend::insufficient(metric, series.len(), last_value);
        };

        let values: Vec<f64> = points.iter().map(|&(_, v)| v).collect();
        let recent = &values[values.len().saturating_sub(VOLATILITY_WINDOW)..];

        let direction = if std_dev(recent) > volatility_threshold(metric) {
            TrendDirection::Volatile
        } else if fit.slope.abs() < STABLE_SLOPE {
            TrendDirection::Stable
        } else if fit.slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        let last_x = points.last().map(|&(x, _)| x).unwrap_or(0.0);
        Trend {
            metric,
            direction,
            change_rate: fit.slope,
            confidence: (fit.r_squared * 100.0).clamp(0.0, 100.0),
            samples: series.len(),
            level: fit.intercept + fit.slope * last_x,
        }
    }
}

/// Recent-window standard deviation past which a series reads as
/// volatile rather than trending
fn volatility_threshold(metric: Metric) -> f64 {
    match metric {
        Metric::Cpu | Metric::Memory => 15.0,
        Metric::ResponseTime => 100.0,
        Metric::Throughput => 20.0,
        Metric::SuccessRate | Metric::ErrorRate => 10.0,
        Metric::UserSatisfaction => 15.0,
        Metric::HourlyCost => 5.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<(i64, f64)> {
        // One sample per minute
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (1_700_000_000 + i as i64 * 60, v))
            .collect()
    }

    #[test]
    fn test_rising_cpu_reads_increasing_with_full_confidence() {
        let analyzer = TrendAnalyzer::default();
        let cpu: Vec<f64> = (70..80).map(|v| v as f64).collect();
        let trend = analyzer.analyze(Metric::Cpu, &series(&cpu));

        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!(trend.change_rate > 0.0);
        assert!((trend.change_rate - 1.0).abs() < 1e-6);
        assert!(trend.confidence > 99.0);
        assert_eq!(trend.samples, 10);
    }

    #[test]
    fn test_perfect_line_confidence_saturates() {
        let analyzer = TrendAnalyzer::default();
        let values: Vec<f64> = (0..20).map(|i| 10.0 + 0.5 * i as f64).collect();
        let trend = analyzer.analyze(Metric::Throughput, &series(&values));

        assert!((trend.confidence - 100.0).abs() < 1e-6);
        assert_eq!(trend.direction, TrendDirection::Increasing);
    }

    #[test]
    fn test_constant_series_is_stable_with_zero_rate() {
        let analyzer = TrendAnalyzer::default();
        let values = vec![55.0; 30];
        let trend = analyzer.analyze(Metric::Memory, &series(&values));

        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.change_rate.abs() < 1e-9);
        assert!((trend.level - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_declining_series_reads_decreasing() {
        let analyzer = TrendAnalyzer::default();
        let values: Vec<f64> = (0..15).map(|i| 90.0 - 2.0 * i as f64).collect();
        let trend = analyzer.analyze(Metric::SuccessRate, &series(&values));

        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!(trend.change_rate < 0.0);
    }

    #[test]
    fn test_choppy_series_reads_volatile() {
        let analyzer = TrendAnalyzer::default();
        let values: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 10.0 } else { 90.0 })
            .collect();
        let trend = analyzer.analyze(Metric::Cpu, &series(&values));

        assert_eq!(trend.direction, TrendDirection::Volatile);
    }

    #[test]
    fn test_short_series_degrades_to_zero_confidence() {
        let analyzer = TrendAnalyzer::default();
        let values: Vec<f64> = (0..5).map(|i| i as f64 * 10.0).collect();
        let trend = analyzer.analyze(Metric::Cpu, &series(&values));

        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.confidence, 0.0);
        assert_eq!(trend.change_rate, 0.0);
        assert_eq!(trend.samples, 5);
        // Degenerate trends still anchor prediction at the last value
        assert!((trend.level - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_extrapolates_the_fit() {
        let analyzer = TrendAnalyzer::default();
        let values: Vec<f64> = (0..20).map(|i| 2.0 * i as f64).collect();
        let trend = analyzer.analyze(Metric::ResponseTime, &series(&values));

        // Level sits at the fitted end of the window (38.0), slope 2/min
        assert!((trend.predict(0.0) - 38.0).abs() < 1e-6);
        assert!((trend.predict(10.0) - 58.0).abs() < 1e-6);
    }
}
