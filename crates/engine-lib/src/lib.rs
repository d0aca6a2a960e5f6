//! Core library for the agent metering engine
//!
//! This crate provides the core functionality for:
//! - Per-agent resource quotas with atomic check-then-commit allocation
//! - An append-only usage ledger and replay-based cost accounting
//! - Performance analytics: trends, anomaly detection, benchmark scores
//! - Optimization recommendations and threshold-driven scaling
//! - Health checks and observability

pub mod advisor;
pub mod analytics;
pub mod cost;
pub mod engine;
pub mod error;
pub mod health;
pub mod history;
pub mod ledger;
pub mod models;
pub mod money;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod quota;
pub mod scaling;

pub use engine::{EngineBuilder, MeterEngine};
pub use error::{EngineError, EngineResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use money::Usd;
pub use observability::{EngineMetrics, StructuredLogger};
