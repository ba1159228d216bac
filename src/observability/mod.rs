//! Observability layer for the Vertex AI client.
//!
//! # Overview
//!
//! - **Tracing**: one span per prediction call with endpoint, instance
//!   count, request id, latency and status
//! - **Metrics**: counters, histograms and gauges for predictions, batches,
//!   parallel fan-outs, circuit breaker transitions and health checks
//!
//! Log lines themselves go straight through the `tracing` macros.
//!
//! # Examples
//!
//! ```rust
//! use integrations_vertex_ai::observability::{Tracer, TracingTracer, SpanStatus};
//!
//! let tracer = TracingTracer::new("vertex_ai");
//! let mut span = tracer.start_span("vertex_ai.predict");
//!
//! span.set_attribute("endpoint_id", "1234567890");
//! span.set_status(SpanStatus::Ok);
//! span.end();
//! ```
//!
//! ```rust
//! use integrations_vertex_ai::observability::{VertexMetrics, TracingMetricsRecorder};
//!
//! let metrics = VertexMetrics::new("vertex_ai", Box::new(TracingMetricsRecorder::new()));
//! metrics.record_prediction("1234567890", "success", 3, 42.0);
//! ```

pub mod metrics;
pub mod tracing;

use std::sync::Arc;

use crate::resilience::{CircuitBreakerHook, CircuitState};

pub use metrics::{DefaultMetricsRecorder, MetricsRecorder, TracingMetricsRecorder, VertexMetrics};
pub use self::tracing::{DefaultTracer, Span, SpanStatus, Tracer, TracingSpan, TracingTracer};

/// Create a default observability stack.
///
/// Returns a tuple of (tracer, metrics) that emit through `tracing`.
pub fn create_default_stack(service_name: &str) -> (Box<dyn Tracer>, VertexMetrics) {
    let tracer = Box::new(TracingTracer::new(service_name));
    let metrics = VertexMetrics::new(service_name, Box::new(TracingMetricsRecorder::new()));

    (tracer, metrics)
}

/// Create a no-op observability stack.
///
/// Suitable for tests or when observability is disabled.
pub fn create_noop_stack(service_name: &str) -> (Box<dyn Tracer>, VertexMetrics) {
    let tracer = Box::new(DefaultTracer::new());
    let metrics = VertexMetrics::new(service_name, Box::new(DefaultMetricsRecorder::new()));

    (tracer, metrics)
}

/// Circuit breaker hook that records every transition as a metric.
pub struct MetricsCircuitBreakerHook {
    endpoint: String,
    metrics: Arc<VertexMetrics>,
}

impl MetricsCircuitBreakerHook {
    /// Creates a hook reporting transitions of the breaker guarding `endpoint`.
    pub fn new(endpoint: impl Into<String>, metrics: Arc<VertexMetrics>) -> Self {
        Self {
            endpoint: endpoint.into(),
            metrics,
        }
    }
}

impl CircuitBreakerHook for MetricsCircuitBreakerHook {
    fn on_state_change(&self, from: CircuitState, to: CircuitState) {
        ::tracing::info!(
            endpoint = %self.endpoint,
            from = %from,
            to = %to,
            "Circuit breaker state changed"
        );
        self.metrics
            .record_circuit_breaker_state(&self.endpoint, to.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingMetricsRecorder;
    use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
    use std::time::Duration;

    #[test]
    fn test_create_default_stack() {
        let (tracer, metrics) = create_default_stack("vertex_ai");
        let span = tracer.start_span("test");
        span.end();
        metrics.record_health_check("1", true);
    }

    #[test]
    fn test_create_noop_stack() {
        let (tracer, metrics) = create_noop_stack("vertex_ai");
        let span = tracer.start_span("test");
        span.end();
        metrics.record_prediction("1", "success", 1, 1.0);
    }

    #[test]
    fn test_metrics_hook_records_transitions() {
        let recorder = RecordingMetricsRecorder::new();
        let metrics = Arc::new(VertexMetrics::new("vertex_ai", Box::new(recorder.clone())));
        let hook = Arc::new(MetricsCircuitBreakerHook::new("42", metrics));

        let breaker = CircuitBreaker::new(CircuitBreakerConfig::new(1, Duration::from_secs(60)))
            .with_hook(hook);
        breaker.record_failure();
        breaker.reset();

        assert_eq!(
            recorder.counter_with_label("vertex_ai_circuit_breaker_state_changes_total", "state", "open"),
            1
        );
        assert_eq!(
            recorder.counter_with_label("vertex_ai_circuit_breaker_state_changes_total", "state", "closed"),
            1
        );
    }
}
