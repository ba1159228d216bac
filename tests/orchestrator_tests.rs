//! Integration tests for the prediction orchestrator.

use async_trait::async_trait;
use integrations_vertex_ai::mocks::MockInvoker;
use integrations_vertex_ai::{
    CircuitState, InvokerError, PredictionOrchestrator, PredictionRequest, RawPrediction,
    RemoteInvoker, VertexConfig, VertexError,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Helper to create a config with one attempt per call.
fn single_attempt_config(failure_threshold: u32) -> VertexConfig {
    VertexConfig::builder()
        .project("test-project")
        .endpoint_id("1234567890")
        .failure_threshold(failure_threshold)
        .recovery_timeout(Duration::from_secs(60))
        .max_retry_attempts(1)
        .build()
        .unwrap()
}

fn create_orchestrator(
    config: VertexConfig,
    invoker: MockInvoker,
) -> (PredictionOrchestrator, Arc<MockInvoker>) {
    let invoker = Arc::new(invoker);
    (PredictionOrchestrator::new(config, invoker.clone()), invoker)
}

fn instances(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({ "i": i })).collect()
}

#[tokio::test]
async fn test_breaker_opens_at_threshold_and_rejects_without_invoking() {
    let (orchestrator, invoker) = create_orchestrator(
        single_attempt_config(3),
        MockInvoker::failing(InvokerError::other("backend exploded")),
    );

    for _ in 0..3 {
        let err = orchestrator.predict(json!({"x": 1})).await.unwrap_err();
        assert!(matches!(err, VertexError::PredictionFailed { .. }));
    }
    assert_eq!(orchestrator.circuit_state(), CircuitState::Open);

    let err = orchestrator.predict(json!({"x": 1})).await.unwrap_err();
    assert!(matches!(err, VertexError::CircuitOpen { .. }));
    assert!(err.is_service_unavailable());
    assert_eq!(err.to_string(), "circuit breaker is open");
    invoker.verify_call_count(3);
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_admits_trial_after_recovery_timeout() {
    let (orchestrator, invoker) = create_orchestrator(
        single_attempt_config(2),
        MockInvoker::failing(InvokerError::other("boom")),
    );

    let _ = orchestrator.predict(json!(1)).await;
    let _ = orchestrator.predict(json!(1)).await;
    assert_eq!(orchestrator.circuit_state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(30)).await;
    let err = orchestrator.predict(json!(1)).await.unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    invoker.verify_call_count(2);

    tokio::time::advance(Duration::from_secs(30)).await;
    let err = orchestrator.predict(json!(1)).await.unwrap_err();
    assert!(matches!(err, VertexError::PredictionFailed { .. }));
    invoker.verify_call_count(3);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_success_closes_and_resets_count() {
    let invoker = MockInvoker::new();
    invoker.enqueue_error(InvokerError::other("boom"));
    invoker.enqueue_error(InvokerError::other("boom"));
    let (orchestrator, _) = create_orchestrator(single_attempt_config(2), invoker);

    let _ = orchestrator.predict(json!(1)).await;
    let _ = orchestrator.predict(json!(1)).await;
    assert_eq!(orchestrator.circuit_breaker().failure_count(), 2);

    tokio::time::advance(Duration::from_secs(60)).await;
    let response = orchestrator.predict(json!(1)).await.unwrap();

    assert_eq!(response.predictions, vec![json!(1)]);
    assert_eq!(orchestrator.circuit_state(), CircuitState::Closed);
    assert_eq!(orchestrator.circuit_breaker().failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens_and_keeps_count() {
    let (orchestrator, _) = create_orchestrator(
        single_attempt_config(2),
        MockInvoker::failing(InvokerError::ServiceUnavailable {
            message: "model is loading".to_string(),
        }),
    );

    let _ = orchestrator.predict(json!(1)).await;
    let _ = orchestrator.predict(json!(1)).await;

    tokio::time::advance(Duration::from_secs(60)).await;
    let err = orchestrator.predict(json!(1)).await.unwrap_err();

    assert!(matches!(err, VertexError::ModelUnavailable { .. }));
    assert_eq!(orchestrator.circuit_state(), CircuitState::Open);
    assert_eq!(orchestrator.circuit_breaker().failure_count(), 3);

    let err = orchestrator.predict(json!(1)).await.unwrap_err();
    assert!(matches!(err, VertexError::CircuitOpen { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_half_open_admits_one_trial_among_parallel_calls() {
    let invoker = MockInvoker::new().with_delay(Duration::from_secs(1));
    invoker.enqueue_error(InvokerError::other("boom"));
    let (orchestrator, invoker) = create_orchestrator(single_attempt_config(1), invoker);

    let _ = orchestrator.predict(json!(1)).await;
    tokio::time::advance(Duration::from_secs(60)).await;

    let results = orchestrator
        .predict_parallel_detailed(vec![vec![json!("a")], vec![json!("b")], vec![json!("c")]], None)
        .await;

    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(VertexError::CircuitOpen { retry_after: None })
    ));
    assert!(matches!(
        results[2],
        Err(VertexError::CircuitOpen { retry_after: None })
    ));
    assert_eq!(orchestrator.circuit_state(), CircuitState::Closed);
    invoker.verify_call_count(2);
}

/// Invoker whose behavior is picked by the `"script"` field of the first
/// instance. Tracks how many `"trial"` calls run at once.
#[derive(Default)]
struct ScriptedInvoker {
    active_trials: AtomicUsize,
    max_trials: AtomicUsize,
}

#[async_trait]
impl RemoteInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        request: &PredictionRequest,
        _timeout: Duration,
    ) -> Result<RawPrediction, InvokerError> {
        match request.instances()[0]["script"].as_str() {
            Some("fail-late") => {
                tokio::time::sleep(Duration::from_secs(25)).await;
                Err(InvokerError::other("late failure"))
            }
            Some("trial") => {
                let active = self.active_trials.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_trials.fetch_max(active, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(30)).await;
                self.active_trials.fetch_sub(1, Ordering::SeqCst);
                Ok(MockInvoker::echo(request))
            }
            _ => Err(InvokerError::other("boom")),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_failure_during_trial_does_not_admit_second_trial() {
    let config = VertexConfig::builder()
        .project("test-project")
        .endpoint_id("1234567890")
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(10))
        .call_timeout(Duration::from_secs(100))
        .max_retry_attempts(1)
        .build()
        .unwrap();
    let invoker = Arc::new(ScriptedInvoker::default());
    let orchestrator = PredictionOrchestrator::new(config, invoker.clone());

    // Admitted while closed, fails at t=25 during the trial
    let late = orchestrator.predict(json!({"script": "fail-late"}));
    let opening = async {
        tokio::task::yield_now().await;
        orchestrator.predict(json!({"script": "fail-now"})).await
    };
    let trial = async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        orchestrator.predict(json!({"script": "trial"})).await
    };
    let rival = async {
        tokio::time::sleep(Duration::from_secs(36)).await;
        orchestrator.predict(json!({"script": "trial"})).await
    };

    let (late, opening, trial, rival) = tokio::join!(late, opening, trial, rival);

    assert!(matches!(late, Err(VertexError::PredictionFailed { .. })));
    assert!(matches!(opening, Err(VertexError::PredictionFailed { .. })));
    assert!(trial.is_ok());
    assert!(matches!(
        rival,
        Err(VertexError::CircuitOpen { retry_after: None })
    ));
    assert_eq!(invoker.max_trials.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.circuit_state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_retry_attempts_and_backoff_per_logical_call() {
    let config = VertexConfig::builder()
        .project("test-project")
        .endpoint_id("1234567890")
        .max_retry_attempts(3)
        .build()
        .unwrap();
    let (orchestrator, invoker) = create_orchestrator(
        config,
        MockInvoker::failing(InvokerError::Status {
            code: 429,
            message: "Too Many Requests".to_string(),
        }),
    );

    let start = Instant::now();
    let err = orchestrator.predict(json!(1)).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, VertexError::QuotaExceeded { .. }));
    invoker.verify_call_count(3);
    // Waits of 1s and 2s between the three attempts
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_millis(3100));
    assert_eq!(orchestrator.circuit_breaker().failure_count(), 1);
}

#[tokio::test]
async fn test_non_transient_fault_is_not_retried() {
    let config = VertexConfig::builder()
        .project("test-project")
        .endpoint_id("1234567890")
        .build()
        .unwrap();
    let (orchestrator, invoker) = create_orchestrator(
        config,
        MockInvoker::failing(InvokerError::InvalidArgument {
            message: "instance 0 has wrong shape".to_string(),
        }),
    );

    let err = orchestrator.predict(json!(1)).await.unwrap_err();

    assert!(matches!(err, VertexError::PredictionFailed { .. }));
    assert!(!err.is_retryable());
    invoker.verify_call_count(1);
}

#[tokio::test]
async fn test_predict_batch_issues_sequential_chunks() {
    let (orchestrator, invoker) =
        create_orchestrator(single_attempt_config(5), MockInvoker::new());

    let responses = orchestrator
        .predict_batch(instances(100), 32)
        .await
        .unwrap();

    let sizes: Vec<usize> = invoker.requests().iter().map(PredictionRequest::len).collect();
    assert_eq!(sizes, vec![32, 32, 32, 4]);
    assert_eq!(responses.len(), 4);

    let flattened: Vec<Value> = responses
        .into_iter()
        .flat_map(|response| response.predictions)
        .collect();
    assert_eq!(flattened, instances(100));
}

#[tokio::test]
async fn test_predict_batch_stops_at_first_failed_chunk() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let invoker = MockInvoker::new().with_handler(move |request| {
        if calls_clone.fetch_add(1, Ordering::SeqCst) == 1 {
            Err(InvokerError::other("Quota exceeded for endpoint"))
        } else {
            Ok(MockInvoker::echo(request))
        }
    });
    let (orchestrator, invoker) = create_orchestrator(single_attempt_config(5), invoker);

    let err = orchestrator
        .predict_batch(instances(100), 32)
        .await
        .unwrap_err();

    assert!(matches!(err, VertexError::QuotaExceeded { .. }));
    invoker.verify_call_count(2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_predict_batch_rejects_zero_batch_size() {
    let (orchestrator, invoker) =
        create_orchestrator(single_attempt_config(5), MockInvoker::new());

    let err = orchestrator.predict_batch(instances(3), 0).await.unwrap_err();

    assert!(matches!(err, VertexError::Request(_)));
    invoker.verify_call_count(0);
}

#[tokio::test]
async fn test_predict_batch_forwards_parameters_to_every_chunk() {
    let (orchestrator, invoker) =
        create_orchestrator(single_attempt_config(5), MockInvoker::new());
    let mut params = Map::new();
    params.insert("confidence_threshold".to_string(), json!(0.5));

    let request = PredictionRequest::new(instances(5)).with_parameters(params.clone());
    let responses = orchestrator.predict_batch(request, 2).await.unwrap();

    assert_eq!(responses.len(), 3);
    for request in invoker.requests() {
        assert_eq!(request.parameters(), Some(&params));
    }
}

#[tokio::test]
async fn test_predict_batch_default_uses_configured_size() {
    let config = VertexConfig::builder()
        .project("test-project")
        .endpoint_id("1234567890")
        .batch_size(10)
        .build()
        .unwrap();
    let (orchestrator, invoker) = create_orchestrator(config, MockInvoker::new());

    orchestrator.predict_batch_default(instances(25)).await.unwrap();

    let sizes: Vec<usize> = invoker.requests().iter().map(PredictionRequest::len).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
}

#[tokio::test]
async fn test_predict_parallel_isolates_failures_and_keeps_order() {
    let invoker = MockInvoker::new().with_handler(|request| {
        if request.instances()[0] == json!("b") {
            Err(InvokerError::other("model crashed"))
        } else {
            Ok(MockInvoker::echo(request))
        }
    });
    let (orchestrator, _) = create_orchestrator(single_attempt_config(5), invoker);

    let results = orchestrator
        .predict_parallel(vec![vec![json!("a")], vec![json!("b")], vec![json!("c")]], None)
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].predictions, vec![json!("a")]);
    assert!(results[1].is_empty());
    assert_eq!(results[2].predictions, vec![json!("c")]);
}

#[tokio::test(start_paused = true)]
async fn test_predict_parallel_runs_concurrently() {
    let invoker = MockInvoker::new().with_delay(Duration::from_secs(1));
    let (orchestrator, invoker) = create_orchestrator(single_attempt_config(5), invoker);

    let start = Instant::now();
    let results = orchestrator
        .predict_parallel((0..4).map(|i| vec![json!(i)]), None)
        .await;

    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(results.len(), 4);
    invoker.verify_call_count(4);
}

#[tokio::test]
async fn test_predict_parallel_forwards_parameters() {
    let (orchestrator, invoker) =
        create_orchestrator(single_attempt_config(5), MockInvoker::new());
    let mut params = Map::new();
    params.insert("top_k".to_string(), json!(3));

    orchestrator
        .predict_parallel(vec![vec![json!(1)], vec![json!(2)]], Some(params.clone()))
        .await;

    let requests = invoker.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.parameters() == Some(&params)));
}

#[tokio::test]
async fn test_single_instance_is_normalized() {
    let (orchestrator, invoker) =
        create_orchestrator(single_attempt_config(5), MockInvoker::new());

    let single = orchestrator.predict(json!({"x": 1})).await.unwrap();
    let listed = orchestrator.predict(json!([{"x": 1}])).await.unwrap();

    assert_eq!(single.predictions, listed.predictions);
    let requests = invoker.requests();
    assert_eq!(requests[0], requests[1]);
    assert_eq!(requests[0].instances(), &[json!({"x": 1})]);
}

#[tokio::test]
async fn test_response_order_matches_request_order() {
    let invoker = MockInvoker::new().with_handler(|request| {
        let predictions = request
            .instances()
            .iter()
            .map(|instance| json!({ "echo": instance }))
            .collect();
        Ok(RawPrediction::new(predictions, "model-7"))
    });
    let (orchestrator, _) = create_orchestrator(single_attempt_config(5), invoker);

    let response = orchestrator.predict(instances(10)).await.unwrap();

    let expected: Vec<Value> = instances(10)
        .into_iter()
        .map(|instance| json!({ "echo": instance }))
        .collect();
    assert_eq!(response.predictions, expected);
    assert_eq!(response.deployed_model_id, "model-7");
}

#[tokio::test]
async fn test_health_check_reports_without_failing() {
    let (healthy, invoker) = create_orchestrator(single_attempt_config(5), MockInvoker::new());
    assert!(healthy.health_check().await);
    assert_eq!(
        invoker.last_request().unwrap().instances(),
        &[json!({"health_check": true})]
    );

    let (unhealthy, _) = create_orchestrator(
        single_attempt_config(1),
        MockInvoker::failing(InvokerError::other("503 Service Unavailable")),
    );
    assert!(!unhealthy.health_check().await);

    // An open circuit also reports unhealthy
    assert_eq!(unhealthy.circuit_state(), CircuitState::Open);
    assert!(!unhealthy.health_check().await);
}

#[tokio::test]
async fn test_response_to_value() {
    let (orchestrator, _) = create_orchestrator(single_attempt_config(5), MockInvoker::new());

    let response = orchestrator.predict(json!("hello")).await.unwrap();
    let value = response.to_value();

    assert_eq!(value["predictions"], json!(["hello"]));
    assert_eq!(value["deployed_model_id"], json!("mock-model"));
    assert!(value["latency_ms"].is_number());
}
