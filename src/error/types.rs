//! Main error type for the Vertex AI prediction client.

use std::time::Duration;
use thiserror::Error;
use super::categories::*;

/// Result type alias for Vertex AI operations.
pub type VertexResult<T> = Result<T, VertexError>;

/// Top-level error type for the Vertex AI integration.
///
/// Prediction faults are surfaced as one of `QuotaExceeded`,
/// `ModelUnavailable` or `PredictionFailed` after retry and circuit
/// breaking have run; the originating [`InvokerError`] stays reachable
/// through [`VertexError::fault`] and `source()`.
#[derive(Error, Debug, Clone)]
pub enum VertexError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    #[error("Quota exceeded: {fault}")]
    QuotaExceeded {
        #[source]
        fault: InvokerError,
    },

    #[error("Model unavailable: {fault}")]
    ModelUnavailable {
        #[source]
        fault: InvokerError,
    },

    #[error("Prediction failed: {fault}")]
    PredictionFailed {
        #[source]
        fault: InvokerError,
    },

    #[error("circuit breaker is open")]
    CircuitOpen { retry_after: Option<Duration> },
}

impl VertexError {
    /// Returns true if a later call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VertexError::QuotaExceeded { .. }
            | VertexError::ModelUnavailable { .. }
            | VertexError::CircuitOpen { .. } => true,
            VertexError::PredictionFailed { fault } => fault.is_transient(),
            _ => false,
        }
    }

    /// Returns true for the service-unavailable kinds: a model reported as
    /// unavailable, or a call the circuit breaker refused.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            VertexError::ModelUnavailable { .. } | VertexError::CircuitOpen { .. }
        )
    }

    /// Returns the time until the circuit breaker admits a trial call.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            VertexError::CircuitOpen { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns the invoker fault behind a prediction error.
    pub fn fault(&self) -> Option<&InvokerError> {
        match self {
            VertexError::QuotaExceeded { fault }
            | VertexError::ModelUnavailable { fault }
            | VertexError::PredictionFailed { fault } => Some(fault),
            _ => None,
        }
    }

    /// Short outcome label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            VertexError::Configuration(_) => "configuration",
            VertexError::Request(_) => "invalid_request",
            VertexError::Response(_) => "invalid_response",
            VertexError::QuotaExceeded { .. } => "quota_exceeded",
            VertexError::ModelUnavailable { .. } => "model_unavailable",
            VertexError::PredictionFailed { .. } => "prediction_failed",
            VertexError::CircuitOpen { .. } => "circuit_open",
        }
    }
}

impl From<url::ParseError> for VertexError {
    fn from(err: url::ParseError) -> Self {
        VertexError::Configuration(ConfigurationError::InvalidBaseUrl {
            url: err.to_string(),
        })
    }
}
