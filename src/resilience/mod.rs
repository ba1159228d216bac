//! Resilience layer for the Vertex AI client.
//!
//! A [`CircuitBreaker`] gates whether a call is attempted at all and a
//! [`RetryExecutor`] retries transient faults with exponential backoff.
//! The [`PredictionOrchestrator`](crate::orchestrator::PredictionOrchestrator)
//! runs the retry loop inside the breaker, so one logical call counts as one
//! breaker outcome however many attempts it took.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{
    CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHook, CircuitState,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT,
};
pub use retry::{
    RetryConfig, RetryExecutor, Retryable, DEFAULT_BASE_BACKOFF, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_BACKOFF,
};
