//! Optimization recommendations derived from analysis reports
//!
//! A pure mapping: bottleneck metrics (scoring below baseline or
//! carrying a high-or-worse anomaly) become ranked recommendations.
//! Nothing here executes anything; acting on a recommendation is the
//! scaling controller's or an operator's call.

use crate::analytics::{AnalysisReport, AnomalySeverity};
use crate::models::Metric;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    ScaleUp,
    Notify,
    Cache,
    Throttle,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::ScaleUp => "scale_up",
            RecommendedAction::Notify => "notify",
            RecommendedAction::Cache => "cache",
            RecommendedAction::Throttle => "throttle",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub metric: Metric,
    pub severity: AnomalySeverity,
    pub action: RecommendedAction,
    /// 1 is most urgent
    pub priority: u8,
    pub impact: String,
    pub rationale: String,
}

/// Stateless; every call works only from the report it is given
#[derive(Debug, Default, Clone, Copy)]
pub struct OptimizationAdvisor;

impl OptimizationAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Map a report to recommendations, most urgent first. A window
    /// with no samples yields nothing rather than flagging every
    /// metric on its zeroed scores.
    pub fn recommend(&self, report: &AnalysisReport) -> Vec<Recommendation> {
        if report.samples == 0 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for metric_score in &report.score.metric_scores {
            let from_score = severity_of_score(metric_score.score);
            let from_anomaly = report
                .anomalies
                .iter()
                .filter(|a| a.metric == metric_score.metric)
                .filter(|a| a.severity >= AnomalySeverity::High)
                .map(|a| a.severity)
                .max();

            let severity = match (from_score, from_anomaly) {
                (Some(s), Some(a)) => Some(s.max(a)),
                (s, a) => s.or(a),
            };
            let Some(severity) = severity else {
                continue;
            };

            let action = action_for(severity);
            let rationale = match from_anomaly {
                Some(anomaly) => format!(
                    "{} scored {:.1} and carries a {} anomaly in the current window",
                    metric_score.metric, metric_score.score, anomaly
                ),
                None => format!(
                    "{} scored {:.1} against platform benchmarks over {} samples",
                    metric_score.metric, metric_score.score, report.samples
                ),
            };

            out.push(Recommendation {
                metric: metric_score.metric,
                severity,
                action,
                priority: priority_of(severity),
                impact: impact_of(action).to_string(),
                rationale,
            });
        }

        out.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.metric.as_str().cmp(b.metric.as_str()))
        });
        out
    }
}

fn severity_of_score(score: f64) -> Option<AnomalySeverity> {
    if score < 30.0 {
        Some(AnomalySeverity::Critical)
    } else if score < 50.0 {
        Some(AnomalySeverity::High)
    } else if score < 70.0 {
        Some(AnomalySeverity::Warning)
    } else if score < 85.0 {
        Some(AnomalySeverity::Info)
    } else {
        None
    }
}

fn action_for(severity: AnomalySeverity) -> RecommendedAction {
    match severity {
        AnomalySeverity::Critical => RecommendedAction::ScaleUp,
        AnomalySeverity::High => RecommendedAction::Notify,
        AnomalySeverity::Warning => RecommendedAction::Cache,
        AnomalySeverity::Info => RecommendedAction::Throttle,
    }
}

fn priority_of(severity: AnomalySeverity) -> u8 {
    match severity {
        AnomalySeverity::Critical => 1,
        AnomalySeverity::High => 2,
        AnomalySeverity::Warning => 3,
        AnomalySeverity::Info => 4,
    }
}

fn impact_of(action: RecommendedAction) -> &'static str {
    match action {
        RecommendedAction::ScaleUp => {
            "Additional capacity should relieve the pressure within one scaling cycle"
        }
        RecommendedAction::Notify => {
            "Operator attention within the hour prevents further degradation"
        }
        RecommendedAction::Cache => {
            "Caching repeated work should lift the score without new capacity"
        }
        RecommendedAction::Throttle => {
            "Smoothing request bursts should steady the metric with little user impact"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{
        Anomaly, DetectorKind, MetricScore, PerformanceScore,
    };

    fn report(metric_scores: Vec<MetricScore>, anomalies: Vec<Anomaly>) -> AnalysisReport {
        AnalysisReport {
            agent_id: "agent-1".to_string(),
            generated_at: 1_700_000_000,
            samples: 20,
            trends: Vec::new(),
            anomalies,
            score: PerformanceScore {
                agent_id: "agent-1".to_string(),
                overall: 75.0,
                efficiency: 75.0,
                reliability: 75.0,
                quality: 75.0,
                scalability: 75.0,
                cost_effectiveness: 75.0,
                metric_scores,
                samples: 20,
            },
        }
    }

    fn metric_score(metric: Metric, score: f64) -> MetricScore {
        MetricScore {
            metric,
            value: 0.0,
            score,
        }
    }

    fn anomaly(metric: Metric, severity: AnomalySeverity) -> Anomaly {
        Anomaly {
            metric,
            timestamp: 1_700_000_000,
            severity,
            score: 80.0,
            expected: 50.0,
            actual: 95.0,
            deviation: 45.0,
            detector: DetectorKind::GlobalZScore,
            recommendations: vec!["check it".to_string()],
        }
    }

    #[test]
    fn test_healthy_report_yields_nothing() {
        let advisor = OptimizationAdvisor::new();
        let report = report(
            vec![
                metric_score(Metric::Cpu, 92.0),
                metric_score(Metric::SuccessRate, 100.0),
            ],
            Vec::new(),
        );
        assert!(advisor.recommend(&report).is_empty());
    }

    #[test]
    fn test_severity_ladder_maps_to_actions() {
        let advisor = OptimizationAdvisor::new();
        let report = report(
            vec![
                metric_score(Metric::Cpu, 25.0),
                metric_score(Metric::ResponseTime, 45.0),
                metric_score(Metric::Memory, 60.0),
                metric_score(Metric::Throughput, 80.0),
            ],
            Vec::new(),
        );

        let recs = advisor.recommend(&report);
        assert_eq!(recs.len(), 4);
        assert_eq!(recs[0].metric, Metric::Cpu);
        assert_eq!(recs[0].action, RecommendedAction::ScaleUp);
        assert_eq!(recs[0].priority, 1);
        assert_eq!(recs[1].action, RecommendedAction::Notify);
        assert_eq!(recs[2].action, RecommendedAction::Cache);
        assert_eq!(recs[3].action, RecommendedAction::Throttle);
        assert_eq!(recs[3].priority, 4);
    }

    #[test]
    fn test_anomaly_escalates_a_well_scored_metric() {
        let advisor = OptimizationAdvisor::new();
        let report = report(
            vec![metric_score(Metric::ErrorRate, 95.0)],
            vec![anomaly(Metric::ErrorRate, AnomalySeverity::Critical)],
        );

        let recs = advisor.recommend(&report);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].severity, AnomalySeverity::Critical);
        assert_eq!(recs[0].action, RecommendedAction::ScaleUp);
        assert!(recs[0].rationale.contains("critical"));
    }

    #[test]
    fn test_warning_anomaly_alone_does_not_trigger() {
        let advisor = OptimizationAdvisor::new();
        let report = report(
            vec![metric_score(Metric::Cpu, 90.0)],
            vec![anomaly(Metric::Cpu, AnomalySeverity::Warning)],
        );
        assert!(advisor.recommend(&report).is_empty());
    }

    #[test]
    fn test_no_samples_means_no_advice() {
        let advisor = OptimizationAdvisor::new();
        let mut empty = report(vec![metric_score(Metric::Cpu, 0.0)], Vec::new());
        empty.samples = 0;
        assert!(advisor.recommend(&empty).is_empty());
    }
}
