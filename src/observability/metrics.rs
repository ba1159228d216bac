//! Metrics recording for the Vertex AI client.

use std::collections::HashMap;

/// Metrics recorder trait.
pub trait MetricsRecorder: Send + Sync {
    /// Increment a counter metric.
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);

    /// Record a histogram value (e.g. request durations, instance counts).
    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Record a gauge value.
    fn record_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// Vertex AI metrics with convenience methods over a [`MetricsRecorder`].
pub struct VertexMetrics {
    prefix: String,
    recorder: Box<dyn MetricsRecorder>,
}

impl VertexMetrics {
    /// Create a new metrics wrapper.
    ///
    /// # Arguments
    /// * `prefix` - Metric name prefix (e.g., "vertex_ai")
    /// * `recorder` - The underlying metrics recorder implementation
    pub fn new(prefix: &str, recorder: Box<dyn MetricsRecorder>) -> Self {
        Self {
            prefix: prefix.to_string(),
            recorder,
        }
    }

    /// Record one `predict` call.
    ///
    /// # Arguments
    /// * `endpoint` - Endpoint id
    /// * `outcome` - `"success"` or an error kind such as `"quota_exceeded"`
    /// * `instances` - Number of instances in the request
    /// * `latency_ms` - Latency of the call in milliseconds
    pub fn record_prediction(&self, endpoint: &str, outcome: &str, instances: usize, latency_ms: f64) {
        let labels = [("endpoint", endpoint), ("outcome", outcome)];

        self.recorder
            .increment_counter(&format!("{}_predictions_total", self.prefix), &labels);

        self.recorder.record_histogram(
            &format!("{}_prediction_latency_ms", self.prefix),
            latency_ms,
            &labels,
        );

        self.recorder.record_histogram(
            &format!("{}_prediction_instances", self.prefix),
            instances as f64,
            &[("endpoint", endpoint)],
        );

        if outcome != "success" {
            self.recorder
                .increment_counter(&format!("{}_prediction_errors_total", self.prefix), &labels);
        }
    }

    /// Record a sequential batch prediction split into `chunks` requests.
    pub fn record_batch(&self, endpoint: &str, chunks: usize) {
        self.recorder.record_histogram(
            &format!("{}_batch_chunks", self.prefix),
            chunks as f64,
            &[("endpoint", endpoint)],
        );
    }

    /// Record a parallel fan-out of `slots` sub-requests, `failed` of which failed.
    pub fn record_parallel(&self, endpoint: &str, slots: usize, failed: usize) {
        self.recorder.record_histogram(
            &format!("{}_parallel_slots", self.prefix),
            slots as f64,
            &[("endpoint", endpoint)],
        );

        self.recorder.record_gauge(
            &format!("{}_parallel_failed_slots", self.prefix),
            failed as f64,
            &[("endpoint", endpoint)],
        );
    }

    /// Record a circuit breaker state change.
    pub fn record_circuit_breaker_state(&self, endpoint: &str, state: &str) {
        self.recorder.increment_counter(
            &format!("{}_circuit_breaker_state_changes_total", self.prefix),
            &[("endpoint", endpoint), ("state", state)],
        );
    }

    /// Record a health check result.
    pub fn record_health_check(&self, endpoint: &str, healthy: bool) {
        self.recorder.record_gauge(
            &format!("{}_endpoint_healthy", self.prefix),
            if healthy { 1.0 } else { 0.0 },
            &[("endpoint", endpoint)],
        );
    }
}

/// Metrics recorder that emits metrics as `tracing` events.
pub struct TracingMetricsRecorder;

impl TracingMetricsRecorder {
    /// Create a new tracing metrics recorder.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingMetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for TracingMetricsRecorder {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let labels_map: HashMap<&str, &str> = labels.iter().copied().collect();
        tracing::debug!(
            metric_type = "counter",
            metric_name = name,
            metric_value = 1,
            labels = ?labels_map,
            "Counter incremented"
        );
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let labels_map: HashMap<&str, &str> = labels.iter().copied().collect();
        tracing::debug!(
            metric_type = "histogram",
            metric_name = name,
            metric_value = value,
            labels = ?labels_map,
            "Histogram recorded"
        );
    }

    fn record_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let labels_map: HashMap<&str, &str> = labels.iter().copied().collect();
        tracing::debug!(
            metric_type = "gauge",
            metric_name = name,
            metric_value = value,
            labels = ?labels_map,
            "Gauge recorded"
        );
    }
}

/// Default metrics recorder implementation (no-op).
#[derive(Default)]
pub struct DefaultMetricsRecorder;

impl DefaultMetricsRecorder {
    /// Creates a new no-op recorder.
    pub fn new() -> Self {
        Self
    }
}

impl MetricsRecorder for DefaultMetricsRecorder {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
    fn record_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
    fn record_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}
