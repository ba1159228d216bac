//! Prediction request type.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{RequestError, VertexResult};

/// An ordered list of instances plus optional prediction parameters.
///
/// Instances are opaque JSON values passed through unchanged. A single
/// non-array value converts into a one-instance request, so
/// `PredictionRequest::from(json!({"x": 1}))` and
/// `PredictionRequest::from(json!([{"x": 1}]))` are the same request.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PredictionRequest {
    instances: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Map<String, Value>>,
}

impl PredictionRequest {
    /// Creates a request from a list of instances.
    pub fn new(instances: Vec<Value>) -> Self {
        Self {
            instances,
            parameters: None,
        }
    }

    /// Creates a request holding a single instance.
    pub fn single(instance: Value) -> Self {
        Self::new(vec![instance])
    }

    /// Attaches prediction parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Returns the instances in submission order.
    pub fn instances(&self) -> &[Value] {
        &self.instances
    }

    /// Returns the prediction parameters, if any.
    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.parameters.as_ref()
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if the request holds no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Checks the request can be submitted.
    pub fn validate(&self) -> VertexResult<()> {
        if self.instances.is_empty() {
            return Err(RequestError::EmptyInstances.into());
        }
        Ok(())
    }

    /// Splits the request into its instances and parameters.
    pub fn into_parts(self) -> (Vec<Value>, Option<Map<String, Value>>) {
        (self.instances, self.parameters)
    }
}

impl From<Value> for PredictionRequest {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(instances) => Self::new(instances),
            instance => Self::single(instance),
        }
    }
}

impl From<Vec<Value>> for PredictionRequest {
    fn from(instances: Vec<Value>) -> Self {
        Self::new(instances)
    }
}

impl From<Map<String, Value>> for PredictionRequest {
    fn from(instance: Map<String, Value>) -> Self {
        Self::single(Value::Object(instance))
    }
}
