//! Metering Engine - Resource metering service for AI agents
//!
//! This binary runs the metering engine: it samples reported usage,
//! enforces quotas and budgets, and serves the metering API.

use anyhow::Result;
use engine_lib::{
    cost::BudgetConfig,
    health::{components, HealthRegistry},
    money::Usd,
    monitor::{MonitorLoopBuilder, ReportedUsageSource},
    MeterEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting metering-engine");

    // Load configuration
    let config = config::EngineConfig::load()?;
    info!(
        instance_name = %config.instance_name,
        api_port = config.api_port,
        "Engine configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::MONITOR).await;
    health_registry.register(components::USAGE_SOURCE).await;
    health_registry.register(components::ALERT_SINK).await;
    health_registry.register(components::SCALING).await;

    // Assemble the engine with the configured budget
    let budget = BudgetConfig::new(
        Usd::from_usd(config.default_daily_budget_usd),
        config.budget_alert_threshold,
    );
    let engine = Arc::new(
        MeterEngine::builder()
            .budget(budget)
            .instance_name(&config.instance_name)
            .build(),
    );
    engine.logger().log_startup(ENGINE_VERSION);

    // Usage source the API feeds and the monitor samples
    let source = Arc::new(ReportedUsageSource::default());

    // Start the monitoring loop
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let monitor = MonitorLoopBuilder::new()
        .source(source.clone())
        .engine(engine.clone())
        .health(health_registry.clone())
        .snapshot_interval(Duration::from_secs(config.snapshot_interval_secs))
        .cost_interval(Duration::from_secs(config.cost_interval_secs))
        .build()?;
    let monitor_handle = tokio::spawn(monitor.run(shutdown_tx.subscribe()));

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        engine.clone(),
        source,
        health_registry.clone(),
    ));

    // Mark engine as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    engine.logger().log_shutdown("SIGINT received");
    info!("Shutting down");

    let _ = shutdown_tx.send(());
    let _ = monitor_handle.await;
    api_handle.abort();

    Ok(())
}
