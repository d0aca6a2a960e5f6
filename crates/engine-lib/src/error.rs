//! Error taxonomy for the metering engine

use crate::models::ResourceType;
use thiserror::Error;

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// An allocation would push the quota window past its limit.
    /// Nothing is committed when this is returned.
    #[error(
        "quota exceeded for agent {agent_id} on {resource}: requested {requested}, remaining {remaining}"
    )]
    QuotaExceeded {
        agent_id: String,
        resource: ResourceType,
        requested: u64,
        remaining: u64,
    },

    /// Malformed request input (non-positive amount, empty agent id, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Not enough samples for the requested computation
    #[error("insufficient data: have {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// A collaborator (usage source, alert sink, executor) did not respond
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Backing store failure
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Short machine-readable code for API error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::QuotaExceeded { .. } => "quota_exceeded",
            EngineError::Validation(_) => "validation",
            EngineError::InsufficientData { .. } => "insufficient_data",
            EngineError::DependencyUnavailable(_) => "dependency_unavailable",
            EngineError::Store(_) => "store",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_message_carries_context() {
        let err = EngineError::QuotaExceeded {
            agent_id: "agent-1".to_string(),
            resource: ResourceType::InferenceTokens,
            requested: 1_200_000,
            remaining: 1_000_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("agent-1"));
        assert!(msg.contains("1200000"));
        assert!(msg.contains("1000000"));
        assert_eq!(err.code(), "quota_exceeded");
    }
}
