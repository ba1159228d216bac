//! Error category types for granular error handling.

use std::time::Duration;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Missing project id")]
    MissingProject,

    #[error("Missing endpoint id")]
    MissingEndpointId,

    #[error("Missing access token")]
    MissingAccessToken,

    #[error("Invalid base URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Request validation errors, raised before anything reaches the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Prediction request must contain at least one instance")]
    EmptyInstances,

    #[error("Invalid batch size: {batch_size} (must be at least 1)")]
    InvalidBatchSize { batch_size: usize },
}

/// Errors in an otherwise successful response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("Expected {expected} predictions, received {actual}")]
    PredictionCountMismatch { expected: usize, actual: usize },
}

/// Fault reported by a [`RemoteInvoker`](crate::invoker::RemoteInvoker).
///
/// Typed variants let the orchestrator classify without inspecting text;
/// `Status` and `Other` carry untyped upstream faults and are classified by
/// their message content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokerError {
    #[error("Request timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("{message}")]
    Other { message: String },
}

impl InvokerError {
    /// Returns true if another attempt may succeed.
    ///
    /// Network faults, timeouts, quota and availability signals and
    /// untyped faults are transient. Malformed requests are not.
    pub fn is_transient(&self) -> bool {
        match self {
            InvokerError::InvalidArgument { .. } => false,
            InvokerError::Status { code, .. } => {
                !(400..500).contains(code) || *code == 408 || *code == 429
            }
            _ => true,
        }
    }

    /// Creates an untyped fault from any displayable error.
    pub fn other(message: impl Into<String>) -> Self {
        InvokerError::Other {
            message: message.into(),
        }
    }
}
