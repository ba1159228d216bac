//! # Vertex AI Prediction Client
//!
//! Resilient Rust client for online predictions against a Google Cloud
//! Vertex AI endpoint.
//!
//! ## Features
//!
//! - Circuit breaker that stops calling a failing endpoint and probes it
//!   with a single trial call after a recovery timeout
//! - Retries with capped exponential backoff for transient faults
//! - Per-call timeouts
//! - Sequential chunked batches and concurrent fan-out with per-slot
//!   failure isolation
//! - Typed failure classification (quota, model unavailable, generic,
//!   circuit open)
//! - Observability through `tracing` spans and metrics
//! - Secure credential handling with `SecretString`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_vertex_ai::{create_orchestrator, VertexConfig};
//! use secrecy::SecretString;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VertexConfig::builder()
//!         .project("my-project")
//!         .location("us-central1")
//!         .endpoint_id("1234567890")
//!         .build()?;
//!
//!     let orchestrator = create_orchestrator(config, SecretString::new("ya29.token".into()))?;
//!
//!     let response = orchestrator.predict(json!({"feature": 1.0})).await?;
//!     println!("{:?}", response.predictions);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `orchestrator` - The prediction entry points
//! - `resilience` - Circuit breaker and retry executor
//! - `invoker` - The remote call seam and its HTTP implementation
//! - `transport` - HTTP transport layer
//! - `config` - Configuration types and builder
//! - `error` - Error types, classification and status mapping
//! - `types` - Requests, responses and batch jobs
//! - `observability` - Tracing and metrics

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod invoker;
pub mod observability;
pub mod orchestrator;
pub mod resilience;
pub mod transport;
pub mod types;

// Development/testing module - always available for integration tests
pub mod mocks;

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

pub use config::{
    VertexConfig, VertexConfigBuilder, DEFAULT_API_VERSION, DEFAULT_CALL_TIMEOUT_SECS,
    DEFAULT_LOCATION,
};
pub use error::{
    // Main error types
    VertexError,
    VertexResult,
    // Error categories
    ConfigurationError,
    InvokerError,
    RequestError,
    ResponseError,
    // Classification and mapping
    classify_failure,
    map_api_status,
    map_http_status_with_body,
};
pub use invoker::{RemoteInvoker, RestInvoker};
pub use orchestrator::PredictionOrchestrator;
pub use resilience::{
    CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHook, CircuitState,
    RetryConfig, RetryExecutor, Retryable,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use types::{BatchJob, PredictionRequest, PredictionResponse, RawPrediction, DEFAULT_BATCH_SIZE};

// Observability re-exports
pub use observability::{
    create_default_stack, create_noop_stack, DefaultMetricsRecorder, DefaultTracer,
    MetricsCircuitBreakerHook, MetricsRecorder, Span, SpanStatus, Tracer, TracingMetricsRecorder,
    TracingTracer, VertexMetrics,
};

/// Connect timeout of the default HTTP transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create an orchestrator that calls the configured endpoint over HTTPS.
///
/// `access_token` is sent as a bearer token on every call.
///
/// # Errors
///
/// Returns a configuration error if the token is empty or the HTTP client
/// cannot be built.
pub fn create_orchestrator(
    config: VertexConfig,
    access_token: SecretString,
) -> VertexResult<PredictionOrchestrator> {
    if access_token.expose_secret().is_empty() {
        return Err(ConfigurationError::MissingAccessToken.into());
    }

    let transport = ReqwestTransport::new(config.call_timeout, DEFAULT_CONNECT_TIMEOUT).map_err(
        |e| ConfigurationError::InvalidConfiguration {
            message: e.to_string(),
        },
    )?;

    let invoker = RestInvoker::new(Arc::new(transport), &config, access_token)?;
    Ok(PredictionOrchestrator::new(config, Arc::new(invoker)))
}

/// Create an orchestrator from environment variables.
///
/// See [`VertexConfig::from_env`]; the token is read from
/// `VERTEX_AI_ACCESS_TOKEN`.
pub fn create_orchestrator_from_env() -> VertexResult<PredictionOrchestrator> {
    let config = VertexConfig::from_env()?;
    let token = std::env::var("VERTEX_AI_ACCESS_TOKEN")
        .map_err(|_| ConfigurationError::MissingAccessToken)?;

    create_orchestrator(config, SecretString::new(token))
}
