//! API client for communicating with the metering engine

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the metering engine
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types. The engine serializes enums as snake_case
// strings and money as nano-USD integers; the CLI keeps them that way
// and formats at the display edge.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub agent_id: String,
    pub resource: String,
    pub limit: u64,
    pub used: u64,
    pub period: String,
    pub reset_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLine {
    pub resource: String,
    pub amount: u64,
    pub cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTracking {
    pub agent_id: String,
    pub period_start: i64,
    pub period_end: i64,
    pub by_resource: Vec<CostLine>,
    pub total_cost: i64,
    pub budget_limit: i64,
    pub alert_threshold: f64,
    pub alert_triggered: bool,
    pub event_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub metric: String,
    pub direction: String,
    pub change_rate: f64,
    pub confidence: f64,
    pub samples: usize,
    pub level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub metric: String,
    pub timestamp: i64,
    pub severity: String,
    pub score: f64,
    pub expected: f64,
    pub actual: f64,
    pub deviation: f64,
    pub detector: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: String,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub agent_id: String,
    pub generated_at: i64,
    pub samples: usize,
    pub trends: Vec<Trend>,
    pub anomalies: Vec<Anomaly>,
    pub score: PerformanceScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub metric: String,
    pub severity: String,
    pub action: String,
    pub priority: u8,
    pub impact: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingEvent {
    pub agent_id: String,
    pub policy_id: String,
    pub timestamp: i64,
    pub metric: String,
    pub observed: f64,
    pub threshold: f64,
    pub from_instances: u32,
    pub to_instances: u32,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_quota_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/agents/agent-1/quotas")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"agent_id":"agent-1","resource":"inference_tokens","limit":1000000,"used":250000,"period":"daily","reset_at":1756166400},
                    {"agent_id":"agent-1","resource":"network_requests","limit":100000,"used":12,"period":"daily","reset_at":1756166400}
                ]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let quotas: Vec<ResourceQuota> =
            client.get("api/v1/agents/agent-1/quotas").await.unwrap();

        mock.assert_async().await;
        assert_eq!(quotas.len(), 2);
        assert_eq!(quotas[0].resource, "inference_tokens");
        assert_eq!(quotas[0].used, 250_000);
        assert_eq!(quotas[1].period, "daily");
    }

    #[tokio::test]
    async fn test_get_parses_cost_tracking() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/agents/agent-1/costs?hours=1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "agent_id":"agent-1",
                    "period_start":1756160000,
                    "period_end":1756163600,
                    "by_resource":[{"resource":"inference_tokens","amount":1000,"cost":2000000}],
                    "total_cost":2000000,
                    "budget_limit":100000000000,
                    "alert_threshold":0.8,
                    "alert_triggered":false,
                    "event_count":1
                }"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let tracking: CostTracking = client
            .get("api/v1/agents/agent-1/costs?hours=1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(tracking.total_cost, 2_000_000);
        assert_eq!(tracking.by_resource.len(), 1);
        assert_eq!(tracking.by_resource[0].amount, 1000);
        assert!(!tracking.alert_triggered);
    }

    #[tokio::test]
    async fn test_get_parses_analysis_report() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/agents/agent-1/analysis")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "agent_id":"agent-1",
                    "generated_at":1756163600,
                    "samples":30,
                    "trends":[{"metric":"cpu","direction":"increasing","change_rate":1.2,"confidence":97.5,"samples":30,"level":82.0}],
                    "anomalies":[{"metric":"response_time","timestamp":1756163500,"severity":"high","score":62.0,"expected":420.0,"actual":910.0,"deviation":490.0,"detector":"global_z_score","recommendations":["Scale up compute allocation"]}],
                    "score":{"agent_id":"agent-1","overall":71.4,"efficiency":65.0,"reliability":88.0,"quality":86.0,"scalability":55.0,"cost_effectiveness":60.0,"metric_scores":[{"metric":"cpu","value":82.0,"score":36.0}],"samples":30}
                }"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let report: AnalysisReport = client
            .get("api/v1/agents/agent-1/analysis")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.samples, 30);
        assert_eq!(report.trends[0].direction, "increasing");
        assert_eq!(report.anomalies[0].severity, "high");
        assert_eq!(report.anomalies[0].recommendations.len(), 1);
        assert!((report.score.overall - 71.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_get_surfaces_api_error_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/agents/agent-1/costs")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"store error: ledger unavailable","code":"store"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: Result<CostTracking> = client.get("api/v1/agents/agent-1/costs").await;

        mock.assert_async().await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("500"));
        assert!(err.contains("store"));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
