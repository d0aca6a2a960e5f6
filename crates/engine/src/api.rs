//! HTTP API for allocation, analytics queries, health, and metrics

use engine_lib::{
    advisor::Recommendation,
    analytics::AnalysisReport,
    cost::CostTracking,
    engine::MeterEngine,
    error::EngineError,
    health::{ComponentStatus, HealthRegistry},
    models::{AgentUsage, CheckResult, MetricSnapshot, ResourceQuota, ResourceType, UsageEvent},
    monitor::ReportedUsageSource,
    scaling::ScalingEvent,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MeterEngine>,
    pub source: Arc<ReportedUsageSource>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(
        engine: Arc<MeterEngine>,
        source: Arc<ReportedUsageSource>,
        health_registry: HealthRegistry,
    ) -> Self {
        Self {
            engine,
            source,
            health_registry,
        }
    }
}

/// Error payload returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Maps engine errors onto HTTP statuses with a JSON envelope
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn not_found(message: String) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: message,
            code: "not_found".to_string(),
        }),
    )
}

/// Read-only quota check request
#[derive(Debug, Deserialize)]
pub struct QuotaCheckRequest {
    pub agent_id: String,
    pub resource: ResourceType,
    pub amount: i64,
}

/// Allocation request
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub agent_id: String,
    pub resource: ResourceType,
    pub amount: i64,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CostsQuery {
    #[serde(default = "default_cost_hours")]
    pub hours: i64,
}

fn default_cost_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    50
}

/// Would this allocation be admitted? Commits nothing either way.
async fn check_quota(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuotaCheckRequest>,
) -> Result<Json<CheckResult>, ApiError> {
    let result = state
        .engine
        .check_quota(&req.agent_id, req.resource, req.amount)
        .await?;
    Ok(Json(result))
}

/// Commit an allocation against the agent's quota window
async fn allocate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AllocateRequest>,
) -> Result<Json<UsageEvent>, ApiError> {
    let event = state
        .engine
        .allocate(&req.agent_id, req.resource, req.amount, req.task_id)
        .await?;
    Ok(Json(event))
}

/// Push live counters for an agent; the monitor samples them on its
/// next cycle
async fn report_usage(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(usage): Json<AgentUsage>,
) -> StatusCode {
    let now = chrono::Utc::now().timestamp();
    state.source.report(&agent_id, usage, now);
    StatusCode::ACCEPTED
}

/// Effective quota windows for every resource
async fn agent_quotas(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<ResourceQuota>>, ApiError> {
    let quotas = state.engine.quotas(&agent_id).await?;
    Ok(Json(quotas))
}

/// Latest recorded snapshot, 404 until the agent has been observed
async fn agent_metrics(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<MetricSnapshot>, (StatusCode, Json<ErrorBody>)> {
    state
        .engine
        .get_metrics(&agent_id)
        .map(Json)
        .ok_or_else(|| not_found(format!("no metrics recorded for agent {}", agent_id)))
}

/// Replayed spend over the trailing window
async fn agent_costs(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<CostsQuery>,
) -> Result<Json<CostTracking>, ApiError> {
    let tracking = state.engine.costs(&agent_id, query.hours).await?;
    Ok(Json(tracking))
}

/// Full analysis report; a thin window yields a degenerate report, not
/// an error
async fn agent_analysis(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Json<AnalysisReport> {
    Json(state.engine.analyze(&agent_id))
}

async fn agent_recommendations(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Json<Vec<Recommendation>> {
    Json(state.engine.recommend(&agent_id))
}

/// Recent scaling events, newest last
async fn scaling_history(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<ScalingEvent>> {
    Json(state.engine.scaling_history(&agent_id, query.limit))
}

/// Evaluate the agent's scaling policies against its latest snapshot
async fn evaluate_scaling(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<ScalingEvent>>, ApiError> {
    let events = state.engine.evaluate_scaling(&agent_id).await?;
    Ok(Json(events))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/quota/check", post(check_quota))
        .route("/api/v1/allocate", post(allocate))
        .route("/api/v1/agents/:agent_id/usage", post(report_usage))
        .route("/api/v1/agents/:agent_id/quotas", get(agent_quotas))
        .route("/api/v1/agents/:agent_id/metrics", get(agent_metrics))
        .route("/api/v1/agents/:agent_id/costs", get(agent_costs))
        .route("/api/v1/agents/:agent_id/analysis", get(agent_analysis))
        .route(
            "/api/v1/agents/:agent_id/recommendations",
            get(agent_recommendations),
        )
        .route(
            "/api/v1/agents/:agent_id/scaling/history",
            get(scaling_history),
        )
        .route(
            "/api/v1/agents/:agent_id/scaling/evaluate",
            post(evaluate_scaling),
        )
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
