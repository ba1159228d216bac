//! Prediction response types.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ResponseError, VertexResult};

/// What a [`RemoteInvoker`](crate::invoker::RemoteInvoker) returns for one call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPrediction {
    /// One prediction per instance, in instance order.
    pub predictions: Vec<Value>,
    /// Identifier of the deployed model that served the call.
    #[serde(default)]
    pub deployed_model_id: String,
    /// Free-form response metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RawPrediction {
    /// Creates a raw prediction without metadata.
    pub fn new(predictions: Vec<Value>, deployed_model_id: impl Into<String>) -> Self {
        Self {
            predictions,
            deployed_model_id: deployed_model_id.into(),
            metadata: Map::new(),
        }
    }
}

/// Structured prediction response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionResponse {
    /// One prediction per instance, in instance order.
    pub predictions: Vec<Value>,
    /// Identifier of the deployed model that served the request.
    pub deployed_model_id: String,
    /// Free-form response metadata.
    pub metadata: Map<String, Value>,
    /// Wall-clock time spent in the circuit breaker, retries and calls.
    pub latency: Duration,
}

impl PredictionResponse {
    /// Builds a response from an invoker result, checking that every
    /// instance received exactly one prediction.
    pub fn from_raw(raw: RawPrediction, expected: usize, latency: Duration) -> VertexResult<Self> {
        if raw.predictions.len() != expected {
            return Err(ResponseError::PredictionCountMismatch {
                expected,
                actual: raw.predictions.len(),
            }
            .into());
        }

        Ok(Self {
            predictions: raw.predictions,
            deployed_model_id: raw.deployed_model_id,
            metadata: raw.metadata,
            latency,
        })
    }

    /// The placeholder used for failed slots of a parallel fan-out.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the response carries no predictions.
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Latency in fractional milliseconds.
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }

    /// Renders the response as a JSON object.
    pub fn to_value(&self) -> Value {
        json!({
            "predictions": self.predictions,
            "deployed_model_id": self.deployed_model_id,
            "metadata": self.metadata,
            "latency_ms": self.latency_ms(),
        })
    }
}
