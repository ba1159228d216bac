//! Configuration types for the Vertex AI prediction client.

use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, VertexError};
use crate::resilience::{
    CircuitBreakerConfig, RetryConfig, DEFAULT_BASE_BACKOFF, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, DEFAULT_RECOVERY_TIMEOUT,
};
use crate::transport::endpoints;
use crate::types::DEFAULT_BATCH_SIZE;

/// Default region.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Default API version.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Default per-call timeout (60 seconds).
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;

/// Configuration for the Vertex AI prediction client.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexConfig {
    /// Google Cloud project id.
    pub project: String,
    /// Region hosting the endpoint.
    pub location: String,
    /// Endpoint id.
    pub endpoint_id: String,
    /// Base URL of the regional API.
    pub base_url: Url,
    /// API version.
    pub api_version: String,
    /// Upper bound on every single invoker call.
    pub call_timeout: Duration,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Time an open circuit waits before admitting a trial call.
    pub recovery_timeout: Duration,
    /// Maximum tries per logical call.
    pub max_retry_attempts: u32,
    /// Wait after the first failed attempt.
    pub base_backoff: Duration,
    /// Upper bound on any single backoff wait.
    pub max_backoff: Duration,
    /// Fraction by which a backoff wait may be randomly shortened.
    pub backoff_jitter: f64,
    /// Instances per chunk for batch predictions.
    pub batch_size: usize,
    /// Maximum sub-requests in flight during a parallel fan-out.
    pub max_parallelism: Option<usize>,
    /// Enable tracing.
    pub enable_tracing: bool,
    /// Enable metrics.
    pub enable_metrics: bool,
}

impl VertexConfig {
    /// Create a new configuration builder.
    pub fn builder() -> VertexConfigBuilder {
        VertexConfigBuilder::default()
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `PROJECT_ID` (or `GOOGLE_CLOUD_PROJECT`), `REGION`,
    /// `ENDPOINT_ID`, and the optional `VERTEX_AI_*` overrides.
    pub fn from_env() -> Result<Self, VertexError> {
        let project = std::env::var("PROJECT_ID")
            .or_else(|_| std::env::var("GOOGLE_CLOUD_PROJECT"))
            .map_err(|_| ConfigurationError::MissingProject)?;

        let endpoint_id = std::env::var("ENDPOINT_ID")
            .map_err(|_| ConfigurationError::MissingEndpointId)?;

        let location = std::env::var("REGION")
            .unwrap_or_else(|_| DEFAULT_LOCATION.to_string());

        let mut builder = Self::builder()
            .project(&project)
            .location(&location)
            .endpoint_id(&endpoint_id);

        if let Ok(base_url) = std::env::var("VERTEX_AI_BASE_URL") {
            builder = builder.base_url(&base_url)?;
        }
        if let Some(secs) = env_parse::<u64>("VERTEX_AI_TIMEOUT_SECS") {
            builder = builder.call_timeout(Duration::from_secs(secs));
        }
        if let Some(threshold) = env_parse::<u32>("VERTEX_AI_FAILURE_THRESHOLD") {
            builder = builder.failure_threshold(threshold);
        }
        if let Some(secs) = env_parse::<u64>("VERTEX_AI_RECOVERY_TIMEOUT_SECS") {
            builder = builder.recovery_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = env_parse::<u32>("VERTEX_AI_MAX_RETRY_ATTEMPTS") {
            builder = builder.max_retry_attempts(attempts);
        }
        if let Some(size) = env_parse::<usize>("VERTEX_AI_BATCH_SIZE") {
            builder = builder.batch_size(size);
        }

        builder.build()
    }

    /// Resource path of the endpoint:
    /// `projects/{project}/locations/{location}/endpoints/{endpoint_id}`.
    pub fn endpoint_path(&self) -> String {
        endpoints::endpoint(&self.project, &self.location, &self.endpoint_id)
    }

    /// Circuit breaker settings derived from this configuration.
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(self.failure_threshold, self.recovery_timeout)
    }

    /// Retry settings derived from this configuration.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_retry_attempts, self.base_backoff, self.max_backoff)
            .with_jitter(self.backoff_jitter)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Builder for [`VertexConfig`].
#[derive(Default)]
pub struct VertexConfigBuilder {
    project: Option<String>,
    location: Option<String>,
    endpoint_id: Option<String>,
    base_url: Option<Url>,
    api_version: Option<String>,
    call_timeout: Option<Duration>,
    failure_threshold: Option<u32>,
    recovery_timeout: Option<Duration>,
    max_retry_attempts: Option<u32>,
    base_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    backoff_jitter: Option<f64>,
    batch_size: Option<usize>,
    max_parallelism: Option<usize>,
    enable_tracing: Option<bool>,
    enable_metrics: Option<bool>,
}

impl VertexConfigBuilder {
    /// Set the project id.
    pub fn project(mut self, project: &str) -> Self {
        self.project = Some(project.to_string());
        self
    }

    /// Set the region.
    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    /// Set the endpoint id.
    pub fn endpoint_id(mut self, endpoint_id: &str) -> Self {
        self.endpoint_id = Some(endpoint_id.to_string());
        self
    }

    /// Override the regional base URL.
    pub fn base_url(mut self, base_url: &str) -> Result<Self, VertexError> {
        self.base_url = Some(Url::parse(base_url)?);
        Ok(self)
    }

    /// Set the API version.
    pub fn api_version(mut self, version: &str) -> Self {
        self.api_version = Some(version.to_string());
        self
    }

    /// Set the per-call timeout.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Set the circuit breaker failure threshold.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set the circuit breaker recovery timeout.
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = Some(timeout);
        self
    }

    /// Set the maximum tries per logical call.
    pub fn max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = Some(attempts);
        self
    }

    /// Set the wait after the first failed attempt.
    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = Some(backoff);
        self
    }

    /// Set the upper bound on backoff waits.
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    /// Set the backoff jitter fraction.
    pub fn backoff_jitter(mut self, jitter: f64) -> Self {
        self.backoff_jitter = Some(jitter);
        self
    }

    /// Set the batch size used by batch predictions.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Bound the number of concurrent sub-requests in a parallel fan-out.
    pub fn max_parallelism(mut self, limit: usize) -> Self {
        self.max_parallelism = Some(limit);
        self
    }

    /// Enable or disable tracing.
    pub fn enable_tracing(mut self, enable: bool) -> Self {
        self.enable_tracing = Some(enable);
        self
    }

    /// Enable or disable metrics.
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<VertexConfig, VertexError> {
        let project = self
            .project
            .filter(|p| !p.is_empty())
            .ok_or(ConfigurationError::MissingProject)?;

        let endpoint_id = self
            .endpoint_id
            .filter(|e| !e.is_empty())
            .ok_or(ConfigurationError::MissingEndpointId)?;

        let location = self.location.unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(&format!("https://{location}-aiplatform.googleapis.com"))?,
        };

        let config = VertexConfig {
            project,
            location,
            endpoint_id,
            base_url,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            call_timeout: self
                .call_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS)),
            failure_threshold: self.failure_threshold.unwrap_or(DEFAULT_FAILURE_THRESHOLD),
            recovery_timeout: self.recovery_timeout.unwrap_or(DEFAULT_RECOVERY_TIMEOUT),
            max_retry_attempts: self.max_retry_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            base_backoff: self.base_backoff.unwrap_or(DEFAULT_BASE_BACKOFF),
            max_backoff: self.max_backoff.unwrap_or(DEFAULT_MAX_BACKOFF),
            backoff_jitter: self.backoff_jitter.unwrap_or(0.0),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            max_parallelism: self.max_parallelism,
            enable_tracing: self.enable_tracing.unwrap_or(true),
            enable_metrics: self.enable_metrics.unwrap_or(true),
        };

        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &VertexConfig) -> Result<(), ConfigurationError> {
    let invalid = |message: &str| ConfigurationError::InvalidConfiguration {
        message: message.to_string(),
    };

    if config.failure_threshold == 0 {
        return Err(invalid("failure_threshold must be at least 1"));
    }
    if config.max_retry_attempts == 0 {
        return Err(invalid("max_retry_attempts must be at least 1"));
    }
    if config.batch_size == 0 {
        return Err(invalid("batch_size must be at least 1"));
    }
    if config.max_parallelism == Some(0) {
        return Err(invalid("max_parallelism must be at least 1"));
    }
    if config.call_timeout.is_zero() {
        return Err(invalid("call_timeout must be greater than zero"));
    }
    if !(0.0..=1.0).contains(&config.backoff_jitter) {
        return Err(invalid("backoff_jitter must be between 0.0 and 1.0"));
    }
    Ok(())
}
