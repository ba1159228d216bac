//! Mock implementations for testing.
//!
//! These mocks let the orchestrator and the REST invoker be exercised
//! without a network: [`MockInvoker`] stands in for a deployed model,
//! [`MockHttpTransport`] for the HTTP layer, and
//! [`RecordingMetricsRecorder`] captures emitted metrics.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::InvokerError;
use crate::invoker::RemoteInvoker;
use crate::observability::MetricsRecorder;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::types::{PredictionRequest, RawPrediction};

type InvokeHandler =
    Arc<dyn Fn(&PredictionRequest) -> Result<RawPrediction, InvokerError> + Send + Sync>;

/// Deployed model id reported by the default echo behavior.
pub const MOCK_MODEL_ID: &str = "mock-model";

/// Mock remote invoker.
///
/// Each call is answered by, in order: the next enqueued result, the
/// handler if one is set, or an echo that returns every instance as its
/// own prediction. Every request is recorded.
///
/// # Example
///
/// ```
/// use integrations_vertex_ai::mocks::MockInvoker;
/// use integrations_vertex_ai::error::InvokerError;
///
/// let invoker = MockInvoker::new();
/// invoker.enqueue_error(InvokerError::other("503 Service Unavailable"));
/// assert_eq!(invoker.call_count(), 0);
/// ```
pub struct MockInvoker {
    responses: Mutex<VecDeque<Result<RawPrediction, InvokerError>>>,
    handler: Option<InvokeHandler>,
    delay: Option<Duration>,
    requests: Mutex<Vec<PredictionRequest>>,
}

impl MockInvoker {
    /// Create a new mock invoker that echoes its instances.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer calls with `handler` once the queue is drained.
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PredictionRequest) -> Result<RawPrediction, InvokerError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sleep for `delay` before answering each call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call with a clone of `error`.
    pub fn failing(error: InvokerError) -> Self {
        Self::new().with_handler(move |_| Err(error.clone()))
    }

    /// Enqueue a result for the next call.
    pub fn enqueue_response(&self, response: Result<RawPrediction, InvokerError>) {
        self.responses.lock().push_back(response);
    }

    /// Enqueue a successful result.
    pub fn enqueue_success(&self, prediction: RawPrediction) {
        self.enqueue_response(Ok(prediction));
    }

    /// Enqueue a failure.
    pub fn enqueue_error(&self, error: InvokerError) {
        self.enqueue_response(Err(error));
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<PredictionRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<PredictionRequest> {
        self.requests.lock().last().cloned()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Verify that exactly `expected` calls were made.
    pub fn verify_call_count(&self, expected: usize) {
        let actual = self.call_count();
        assert_eq!(actual, expected, "Expected {} calls, got {}", expected, actual);
    }

    /// The echo result for `request`.
    pub fn echo(request: &PredictionRequest) -> RawPrediction {
        RawPrediction::new(request.instances().to_vec(), MOCK_MODEL_ID)
    }
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteInvoker for MockInvoker {
    async fn invoke(
        &self,
        request: &PredictionRequest,
        _timeout: Duration,
    ) -> Result<RawPrediction, InvokerError> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.responses.lock().pop_front();
        match (queued, &self.handler) {
            (Some(response), _) => response,
            (None, Some(handler)) => handler(request),
            (None, None) => Ok(Self::echo(request)),
        }
    }
}

/// Mock HTTP transport for testing.
///
/// Enqueued responses are returned in order; every request is recorded.
pub struct MockHttpTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpTransport {
    /// Create a new mock HTTP transport.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue a response to be returned by the next request.
    pub fn enqueue_response(&self, response: Result<HttpResponse, TransportError>) {
        self.responses.lock().push_back(response);
    }

    /// Enqueue a JSON response with the given status code and body.
    pub fn enqueue_json_response(&self, status: u16, body: &str) {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        self.enqueue_response(Ok(HttpResponse {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        }));
    }

    /// Enqueue a transport error.
    pub fn enqueue_error(&self, error: TransportError) {
        self.enqueue_response(Err(error));
    }

    /// Get all requests that were made.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Get the last request that was made.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    /// Verify that exactly `expected` requests were made.
    pub fn verify_request_count(&self, expected: usize) {
        let actual = self.requests.lock().len();
        assert_eq!(actual, expected, "Expected {} requests, got {}", expected, actual);
    }

    /// Verify that a request carried a header with the given value.
    pub fn verify_header(&self, index: usize, header_name: &str, header_value: &str) {
        let requests = self.requests.lock();
        assert!(index < requests.len(), "No request at index {}", index);

        let actual = requests[index].headers.get(header_name).map(String::as_str);
        assert_eq!(
            actual,
            Some(header_value),
            "Expected header '{}' to be '{}'",
            header_name,
            header_value
        );
    }
}

impl Default for MockHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("No mock response enqueued".to_string())))
    }
}

#[derive(Default)]
struct RecordedMetrics {
    counters: Vec<(String, Vec<(String, String)>)>,
    histograms: HashMap<String, Vec<f64>>,
    gauges: HashMap<String, f64>,
}

/// Metrics recorder that keeps everything it is given.
///
/// Clones share storage, so a test can hand one clone to
/// [`VertexMetrics`](crate::observability::VertexMetrics) and inspect another.
#[derive(Clone, Default)]
pub struct RecordingMetricsRecorder {
    inner: Arc<Mutex<RecordedMetrics>>,
}

impl RecordingMetricsRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of increments of counter `name`.
    pub fn counter(&self, name: &str) -> usize {
        self.inner
            .lock()
            .counters
            .iter()
            .filter(|(counter, _)| counter == name)
            .count()
    }

    /// Number of increments of counter `name` carrying label `key=value`.
    pub fn counter_with_label(&self, name: &str, key: &str, value: &str) -> usize {
        self.inner
            .lock()
            .counters
            .iter()
            .filter(|(counter, labels)| {
                counter == name && labels.iter().any(|(k, v)| k == key && v == value)
            })
            .count()
    }

    /// Every value recorded for histogram `name`.
    pub fn histogram(&self, name: &str) -> Vec<f64> {
        self.inner
            .lock()
            .histograms
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Latest value of gauge `name`.
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.inner.lock().gauges.get(name).copied()
    }
}

impl MetricsRecorder for RecordingMetricsRecorder {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let labels = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.inner.lock().counters.push((name.to_string(), labels));
    }

    fn record_histogram(&self, name: &str, value: f64, _labels: &[(&str, &str)]) {
        self.inner
            .lock()
            .histograms
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn record_gauge(&self, name: &str, value: f64, _labels: &[(&str, &str)]) {
        self.inner.lock().gauges.insert(name.to_string(), value);
    }
}
