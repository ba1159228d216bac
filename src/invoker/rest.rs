//! HTTP invoker for the Vertex AI `:predict` method.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use super::RemoteInvoker;
use crate::config::VertexConfig;
use crate::error::{map_http_status_with_body, InvokerError, VertexResult};
use crate::transport::{endpoints, HttpRequest, HttpTransport};
use crate::types::{PredictionRequest, RawPrediction};

/// Body of a successful `:predict` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponseBody {
    predictions: Vec<Value>,
    #[serde(default)]
    deployed_model_id: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    model_version_id: Option<String>,
    #[serde(default)]
    model_display_name: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

impl From<PredictResponseBody> for RawPrediction {
    fn from(body: PredictResponseBody) -> Self {
        let mut metadata = Map::new();
        if let Some(model) = body.model {
            metadata.insert("model".to_string(), Value::String(model));
        }
        if let Some(version) = body.model_version_id {
            metadata.insert("model_version_id".to_string(), Value::String(version));
        }
        if let Some(name) = body.model_display_name {
            metadata.insert("model_display_name".to_string(), Value::String(name));
        }
        match body.metadata {
            Some(Value::Object(extra)) => metadata.extend(extra),
            Some(Value::Null) | None => {}
            Some(other) => {
                metadata.insert("metadata".to_string(), other);
            }
        }

        RawPrediction {
            predictions: body.predictions,
            deployed_model_id: body.deployed_model_id,
            metadata,
        }
    }
}

/// [`RemoteInvoker`] that posts to an endpoint's `:predict` URL.
///
/// The bearer token is supplied by the caller and sent as is; obtaining
/// and refreshing it is left to the caller.
pub struct RestInvoker {
    transport: Arc<dyn HttpTransport>,
    predict_url: Url,
    access_token: SecretString,
}

impl RestInvoker {
    /// Creates an invoker for the endpoint described by `config`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &VertexConfig,
        access_token: SecretString,
    ) -> VertexResult<Self> {
        let predict_url =
            endpoints::predict_url(&config.base_url, &config.api_version, &config.endpoint_path())?;

        Ok(Self {
            transport,
            predict_url,
            access_token,
        })
    }

    /// The URL predictions are posted to.
    pub fn predict_url(&self) -> &Url {
        &self.predict_url
    }
}

#[async_trait]
impl RemoteInvoker for RestInvoker {
    async fn invoke(
        &self,
        request: &PredictionRequest,
        timeout: Duration,
    ) -> Result<RawPrediction, InvokerError> {
        let body = serde_json::to_vec(request).map_err(|e| InvokerError::InvalidArgument {
            message: format!("Failed to serialize request: {e}"),
        })?;

        let http_request = HttpRequest::post_json(self.predict_url.as_str(), Bytes::from(body))
            .with_header(
                "authorization",
                format!("Bearer {}", self.access_token.expose_secret()),
            )
            .with_timeout(timeout);

        tracing::debug!(
            url = %self.predict_url,
            instances = request.len(),
            "Sending prediction request"
        );

        let response = self.transport.send(http_request).await?;

        if !response.is_success() {
            let fault = map_http_status_with_body(response.status, &response.body);
            tracing::debug!(status = response.status, error = %fault, "Prediction request failed");
            return Err(fault);
        }

        let parsed: PredictResponseBody = serde_json::from_slice(&response.body).map_err(|e| {
            InvokerError::other(format!("Failed to parse prediction response: {e}"))
        })?;

        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, TransportError};
    use mockall::mock;
    use mockall::predicate::always;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    mock! {
        pub Transport {}

        #[async_trait]
        impl HttpTransport for Transport {
            async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
        }
    }

    fn config() -> VertexConfig {
        VertexConfig::builder()
            .project("my-project")
            .endpoint_id("42")
            .build()
            .unwrap()
    }

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn invoker(transport: MockTransport) -> RestInvoker {
        RestInvoker::new(
            Arc::new(transport),
            &config(),
            SecretString::new("token-123".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_url() {
        let invoker = invoker(MockTransport::new());
        assert_eq!(
            invoker.predict_url().as_str(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/my-project/locations/us-central1/endpoints/42:predict"
        );
    }

    #[tokio::test]
    async fn test_invoke_sends_instances_and_token() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
                request.headers.get("authorization").map(String::as_str) == Some("Bearer token-123")
                    && request.timeout == Some(Duration::from_secs(5))
                    && body == json!({"instances": [{"x": 1}], "parameters": {"temperature": 0.2}})
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    json!({
                        "predictions": [{"score": 0.9}],
                        "deployedModelId": "dm-1",
                        "modelDisplayName": "classifier",
                        "metadata": {"region": "us"}
                    }),
                ))
            });

        let mut params = Map::new();
        params.insert("temperature".to_string(), json!(0.2));
        let request = PredictionRequest::single(json!({"x": 1})).with_parameters(params);

        let raw = invoker(transport)
            .invoke(&request, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(raw.predictions, vec![json!({"score": 0.9})]);
        assert_eq!(raw.deployed_model_id, "dm-1");
        assert_eq!(raw.metadata.get("model_display_name"), Some(&json!("classifier")));
        assert_eq!(raw.metadata.get("region"), Some(&json!("us")));
    }

    #[tokio::test]
    async fn test_error_status_is_mapped() {
        let mut transport = MockTransport::new();
        transport.expect_send().with(always()).returning(|_| {
            Ok(response(
                429,
                json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}),
            ))
        });

        let err = invoker(transport)
            .invoke(&PredictionRequest::single(json!(1)), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, InvokerError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_transport_timeout_is_mapped() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(TransportError::Timeout));

        let err = invoker(transport)
            .invoke(&PredictionRequest::single(json!(1)), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, InvokerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(response(200, json!({"unexpected": true}))));

        let err = invoker(transport)
            .invoke(&PredictionRequest::single(json!(1)), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to parse prediction response"));
    }
}
