//! Failure classification and HTTP status mapping.
//!
//! [`classify_failure`] turns the final invoker fault into the error kind
//! callers see. Typed faults are mapped directly; untyped faults fall back
//! to the message heuristics the managed API's errors have always been
//! matched with ("quota"/"429" and "503"/"unavailable").

use std::time::Duration;
use serde::Deserialize;
use super::categories::*;
use super::types::VertexError;

/// Structured error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Detailed error information from the API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

/// Classifies the fault surfaced by the retry and circuit breaker layers.
pub fn classify_failure(fault: InvokerError) -> VertexError {
    match &fault {
        InvokerError::QuotaExceeded { .. } | InvokerError::Status { code: 429, .. } => {
            VertexError::QuotaExceeded { fault }
        }
        InvokerError::ServiceUnavailable { .. } | InvokerError::Status { code: 503, .. } => {
            VertexError::ModelUnavailable { fault }
        }
        InvokerError::Timeout { .. } | InvokerError::InvalidArgument { .. } => {
            VertexError::PredictionFailed { fault }
        }
        InvokerError::ConnectionFailed { .. }
        | InvokerError::Status { .. }
        | InvokerError::Other { .. } => classify_by_message(fault),
    }
}

fn classify_by_message(fault: InvokerError) -> VertexError {
    let message = fault.to_string();
    let lowered = message.to_lowercase();

    if lowered.contains("quota") || message.contains("429") {
        VertexError::QuotaExceeded { fault }
    } else if message.contains("503") || lowered.contains("unavailable") {
        VertexError::ModelUnavailable { fault }
    } else {
        VertexError::PredictionFailed { fault }
    }
}

/// Maps an HTTP status code and response body to an [`InvokerError`].
///
/// The Google error envelope is parsed when present; a known canonical
/// status name in it takes precedence over the numeric code.
pub fn map_http_status_with_body(status: u16, body: &[u8]) -> InvokerError {
    let (message, status_name) = match serde_json::from_slice::<ApiErrorResponse>(body) {
        Ok(envelope) => (envelope.error.message, Some(envelope.error.status)),
        Err(_) => (String::from_utf8_lossy(body).trim().to_string(), None),
    };

    if let Some(mapped) = status_name
        .filter(|name| !name.is_empty())
        .and_then(|name| map_api_status(&name, message.clone()))
    {
        return mapped;
    }

    match status {
        400 => InvokerError::InvalidArgument { message },

        // Quota problems on Google APIs sometimes surface as 403
        403 if message.to_lowercase().contains("quota") => {
            InvokerError::QuotaExceeded { message }
        }

        408 | 504 => InvokerError::Timeout {
            duration: Duration::from_secs(0),
        },

        429 => InvokerError::QuotaExceeded { message },

        503 => InvokerError::ServiceUnavailable { message },

        _ => InvokerError::Status {
            code: status,
            message,
        },
    }
}

/// Maps a canonical Google API status name to an [`InvokerError`].
///
/// Returns `None` for names without a more specific mapping, leaving the
/// caller to fall back on the HTTP status.
pub fn map_api_status(status_name: &str, message: String) -> Option<InvokerError> {
    let mapped = match status_name {
        "RESOURCE_EXHAUSTED" => InvokerError::QuotaExceeded { message },
        "UNAVAILABLE" => InvokerError::ServiceUnavailable { message },
        "DEADLINE_EXCEEDED" => InvokerError::Timeout {
            duration: Duration::from_secs(0),
        },
        "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "OUT_OF_RANGE" => {
            InvokerError::InvalidArgument { message }
        }
        "UNAUTHENTICATED" => InvokerError::Status { code: 401, message },
        "PERMISSION_DENIED" => InvokerError::Status { code: 403, message },
        "NOT_FOUND" => InvokerError::Status { code: 404, message },
        "INTERNAL" | "ABORTED" | "UNKNOWN" => InvokerError::Status { code: 500, message },
        _ => return None,
    };
    Some(mapped)
}
