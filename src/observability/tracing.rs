//! Span-based tracing for prediction calls.

use std::collections::HashMap;
use std::time::Instant;

/// Tracer trait for creating spans.
pub trait Tracer: Send + Sync {
    /// Start a new span with the given name (e.g. `"vertex_ai.predict"`).
    fn start_span(&self, name: &str) -> Box<dyn Span>;
}

/// A traced operation.
///
/// Spans collect attributes while the operation runs and emit one
/// structured record when ended.
pub trait Span: Send {
    /// Set an attribute on the span.
    fn set_attribute(&mut self, key: &str, value: &str);

    /// Set the span status.
    fn set_status(&mut self, status: SpanStatus);

    /// End the span and emit its record.
    fn end(self: Box<Self>);
}

/// Status of a span.
#[derive(Debug, Clone, PartialEq)]
pub enum SpanStatus {
    /// Operation completed successfully.
    Ok,
    /// Operation failed with an error message.
    Error(String),
}

/// Tracer that emits span records as `tracing` events.
pub struct TracingTracer {
    service_name: String,
}

impl TracingTracer {
    /// Create a new tracing tracer.
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str) -> Box<dyn Span> {
        tracing::debug!(
            service = %self.service_name,
            span_name = %name,
            "Span started"
        );

        Box::new(TracingSpan {
            name: name.to_string(),
            service_name: self.service_name.clone(),
            start: Instant::now(),
            attributes: HashMap::new(),
            status: None,
        })
    }
}

/// Span implementation backed by the `tracing` crate.
pub struct TracingSpan {
    name: String,
    service_name: String,
    start: Instant,
    attributes: HashMap<String, String>,
    status: Option<SpanStatus>,
}

impl Span for TracingSpan {
    fn set_attribute(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    fn set_status(&mut self, status: SpanStatus) {
        if let SpanStatus::Error(msg) = &status {
            tracing::error!(
                span_name = %self.name,
                error = %msg,
                "Span failed"
            );
        }
        self.status = Some(status);
    }

    fn end(self: Box<Self>) {
        let status = match &self.status {
            Some(SpanStatus::Ok) => "ok",
            Some(SpanStatus::Error(_)) => "error",
            None => "unknown",
        };

        tracing::info!(
            service = %self.service_name,
            span_name = %self.name,
            duration_ms = self.start.elapsed().as_millis() as u64,
            status,
            attributes = ?self.attributes,
            "Span ended"
        );
    }
}

/// Default tracer implementation (no-op), used when tracing is disabled.
pub struct DefaultTracer;

impl DefaultTracer {
    /// Creates a new no-op tracer.
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for DefaultTracer {
    fn start_span(&self, _name: &str) -> Box<dyn Span> {
        Box::new(NoOpSpan)
    }
}

struct NoOpSpan;

impl Span for NoOpSpan {
    fn set_attribute(&mut self, _key: &str, _value: &str) {}
    fn set_status(&mut self, _status: SpanStatus) {}
    fn end(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_tracer_creation() {
        let tracer = TracingTracer::new("vertex-ai");
        assert_eq!(tracer.service_name, "vertex-ai");
    }

    #[test]
    fn test_span_lifecycle() {
        let tracer = TracingTracer::new("vertex-ai");
        let mut span = tracer.start_span("vertex_ai.predict");

        span.set_attribute("endpoint_id", "1234567890");
        span.set_attribute("num_instances", "3");
        span.set_status(SpanStatus::Error("Quota exceeded".to_string()));
        span.end();
    }

    #[test]
    fn test_default_tracer_noop() {
        let tracer = DefaultTracer::new();
        let mut span = tracer.start_span("vertex_ai.predict");

        span.set_attribute("key", "value");
        span.set_status(SpanStatus::Ok);
        span.end();
    }
}
