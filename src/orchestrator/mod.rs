//! Prediction orchestration.
//!
//! [`PredictionOrchestrator`] wraps every remote call in the same chain:
//! the circuit breaker gates a retry loop, and each attempt inside it is
//! bounded by the configured call timeout. Faults that survive the chain
//! are classified into the public error kinds.

use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::VertexConfig;
use crate::error::{classify_failure, InvokerError, VertexError, VertexResult};
use crate::invoker::RemoteInvoker;
use crate::observability::{
    DefaultMetricsRecorder, DefaultTracer, MetricsCircuitBreakerHook, MetricsRecorder, SpanStatus,
    Tracer, TracingMetricsRecorder, TracingTracer, VertexMetrics,
};
use crate::resilience::{CallError, CircuitBreaker, CircuitState, RetryExecutor};
use crate::types::{BatchJob, PredictionRequest, PredictionResponse, RawPrediction};

/// Service name used for spans and as the metric prefix.
pub const SERVICE_NAME: &str = "vertex_ai";

/// Resilient client for one Vertex AI endpoint.
///
/// The orchestrator owns its circuit breaker, so every call made through
/// one orchestrator (including concurrent sub-requests of
/// [`predict_parallel`](Self::predict_parallel)) shares a single breaker.
pub struct PredictionOrchestrator {
    config: VertexConfig,
    invoker: Arc<dyn RemoteInvoker>,
    circuit_breaker: CircuitBreaker,
    retry: RetryExecutor,
    tracer: Box<dyn Tracer>,
    metrics: Arc<VertexMetrics>,
}

impl PredictionOrchestrator {
    /// Creates an orchestrator with the observability stack selected by
    /// `enable_tracing` and `enable_metrics`.
    pub fn new(config: VertexConfig, invoker: Arc<dyn RemoteInvoker>) -> Self {
        let tracer: Box<dyn Tracer> = if config.enable_tracing {
            Box::new(TracingTracer::new(SERVICE_NAME))
        } else {
            Box::new(DefaultTracer::new())
        };

        let recorder: Box<dyn MetricsRecorder> = if config.enable_metrics {
            Box::new(TracingMetricsRecorder::new())
        } else {
            Box::new(DefaultMetricsRecorder::new())
        };

        Self::with_observability(
            config,
            invoker,
            tracer,
            VertexMetrics::new(SERVICE_NAME, recorder),
        )
    }

    /// Creates an orchestrator with a caller-supplied tracer and metrics.
    pub fn with_observability(
        config: VertexConfig,
        invoker: Arc<dyn RemoteInvoker>,
        tracer: Box<dyn Tracer>,
        metrics: VertexMetrics,
    ) -> Self {
        let metrics = Arc::new(metrics);
        let hook = MetricsCircuitBreakerHook::new(config.endpoint_id.clone(), metrics.clone());
        let circuit_breaker =
            CircuitBreaker::new(config.circuit_breaker_config()).with_hook(Arc::new(hook));
        let retry = RetryExecutor::new(config.retry_config());

        tracing::info!(
            endpoint = %config.endpoint_path(),
            failure_threshold = config.failure_threshold,
            max_retry_attempts = config.max_retry_attempts,
            "Initialized prediction orchestrator"
        );

        Self {
            config,
            invoker,
            circuit_breaker,
            retry,
            tracer,
            metrics,
        }
    }

    /// Runs one prediction through the circuit breaker and retry chain.
    ///
    /// A lone non-array JSON value is a one-instance request. The response
    /// holds exactly one prediction per instance, in instance order.
    ///
    /// # Errors
    ///
    /// - [`VertexError::Request`] for a request without instances
    /// - [`VertexError::CircuitOpen`] when the breaker refuses the call
    /// - [`VertexError::QuotaExceeded`], [`VertexError::ModelUnavailable`]
    ///   or [`VertexError::PredictionFailed`] for the final fault
    /// - [`VertexError::Response`] when the prediction count is wrong
    pub async fn predict(
        &self,
        request: impl Into<PredictionRequest>,
    ) -> VertexResult<PredictionResponse> {
        let request = request.into();
        request.validate()?;

        let request_id = Uuid::new_v4().to_string();
        let num_instances = request.len();

        let mut span = self.tracer.start_span("vertex_ai.predict");
        span.set_attribute("endpoint_id", &self.config.endpoint_id);
        span.set_attribute("num_instances", &num_instances.to_string());
        span.set_attribute("request_id", &request_id);

        let start = Instant::now();
        let raw = self.invoke_with_resilience(&request).await;
        let latency = start.elapsed();

        let result = raw.and_then(|raw| PredictionResponse::from_raw(raw, num_instances, latency));
        let latency_ms = latency.as_secs_f64() * 1000.0;
        span.set_attribute("latency_ms", &format!("{latency_ms:.2}"));

        let outcome = match &result {
            Ok(response) => {
                span.set_attribute("deployed_model_id", &response.deployed_model_id);
                span.set_status(SpanStatus::Ok);
                tracing::info!(
                    endpoint_id = %self.config.endpoint_id,
                    num_instances,
                    latency_ms,
                    request_id = %request_id,
                    deployed_model_id = %response.deployed_model_id,
                    "Prediction completed"
                );
                "success"
            }
            Err(err) => {
                span.set_attribute("error_kind", err.kind());
                span.set_status(SpanStatus::Error(err.to_string()));
                tracing::error!(
                    endpoint_id = %self.config.endpoint_id,
                    num_instances,
                    latency_ms,
                    request_id = %request_id,
                    error = %err,
                    "Prediction failed"
                );
                err.kind()
            }
        };
        span.end();

        self.metrics
            .record_prediction(&self.config.endpoint_id, outcome, num_instances, latency_ms);

        result
    }

    /// Predicts `request` in consecutive chunks of at most `batch_size`
    /// instances, one chunk at a time and in order.
    ///
    /// Parameters of `request` are sent with every chunk. The first chunk
    /// failure is returned and no later chunk is submitted. An empty
    /// request yields no responses.
    pub async fn predict_batch(
        &self,
        request: impl Into<PredictionRequest>,
        batch_size: usize,
    ) -> VertexResult<Vec<PredictionResponse>> {
        let job = BatchJob::new(request.into(), batch_size)?;
        let total = job.len();
        self.metrics.record_batch(&self.config.endpoint_id, total);

        let mut responses = Vec::with_capacity(total);
        for (index, chunk) in job.into_iter().enumerate() {
            let response = self.predict(chunk).await?;
            tracing::info!("Processed batch {}/{}", index + 1, total);
            responses.push(response);
        }

        Ok(responses)
    }

    /// [`predict_batch`](Self::predict_batch) with the configured batch size.
    pub async fn predict_batch_default(
        &self,
        request: impl Into<PredictionRequest>,
    ) -> VertexResult<Vec<PredictionResponse>> {
        self.predict_batch(request, self.config.batch_size).await
    }

    /// Predicts every instance list concurrently.
    ///
    /// Slot `i` of the output belongs to list `i` of the input. A failed
    /// slot holds [`PredictionResponse::empty`] and does not affect its
    /// siblings.
    pub async fn predict_parallel<I>(
        &self,
        batches: I,
        parameters: Option<Map<String, Value>>,
    ) -> Vec<PredictionResponse>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        self.predict_parallel_detailed(batches, parameters)
            .await
            .into_iter()
            .map(Result::unwrap_or_default)
            .collect()
    }

    /// Like [`predict_parallel`](Self::predict_parallel), but keeps the
    /// error of every failed slot.
    pub async fn predict_parallel_detailed<I>(
        &self,
        batches: I,
        parameters: Option<Map<String, Value>>,
    ) -> Vec<VertexResult<PredictionResponse>>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let requests: Vec<PredictionRequest> = batches
            .into_iter()
            .map(|instances| {
                let request = PredictionRequest::new(instances);
                match &parameters {
                    Some(params) => request.with_parameters(params.clone()),
                    None => request,
                }
            })
            .collect();

        let slots = requests.len();
        let calls = requests.into_iter().map(|request| self.predict(request));

        let results: Vec<VertexResult<PredictionResponse>> = match self.config.max_parallelism {
            Some(limit) => stream::iter(calls).buffered(limit).collect().await,
            None => join_all(calls).await,
        };

        let mut failed = 0;
        for (index, result) in results.iter().enumerate() {
            if let Err(err) = result {
                failed += 1;
                tracing::warn!("Parallel prediction {} failed: {}", index, err);
            }
        }
        self.metrics
            .record_parallel(&self.config.endpoint_id, slots, failed);

        results
    }

    /// Sends one synthetic prediction and reports whether it succeeded.
    ///
    /// Never fails; the error of an unhealthy endpoint is logged.
    pub async fn health_check(&self) -> bool {
        let probe = PredictionRequest::single(json!({ "health_check": true }));

        let healthy = match self.predict(probe).await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("Health check failed: {}", err);
                false
            }
        };

        self.metrics
            .record_health_check(&self.config.endpoint_id, healthy);
        healthy
    }

    /// The circuit breaker guarding this endpoint.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Current circuit state.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    /// Closes the circuit and clears its failure count.
    pub fn reset(&self) {
        self.circuit_breaker.reset();
    }

    async fn invoke_with_resilience(&self, request: &PredictionRequest) -> VertexResult<RawPrediction> {
        self.circuit_breaker
            .call(|| self.retry.execute(|| self.invoke_once(request)))
            .await
            .map_err(|err| match err {
                CallError::Rejected { retry_after } => {
                    tracing::warn!(
                        endpoint_id = %self.config.endpoint_id,
                        "Circuit breaker is open, rejecting request"
                    );
                    VertexError::CircuitOpen { retry_after }
                }
                CallError::Failed(fault) => classify_failure(fault),
            })
    }

    async fn invoke_once(&self, request: &PredictionRequest) -> Result<RawPrediction, InvokerError> {
        let call_timeout = self.config.call_timeout;

        match tokio::time::timeout(call_timeout, self.invoker.invoke(request, call_timeout)).await {
            Ok(result) => result,
            Err(_) => Err(InvokerError::Timeout {
                duration: call_timeout,
            }),
        }
    }
}

impl std::fmt::Debug for PredictionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionOrchestrator")
            .field("endpoint", &self.config.endpoint_path())
            .field("circuit_breaker", &self.circuit_breaker)
            .finish_non_exhaustive()
    }
}
