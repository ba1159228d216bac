//! Transport layer error types.

use crate::error::InvokerError;

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Timeout")]
    Timeout,
    #[error("Request error: {0}")]
    Request(String),
}

impl From<TransportError> for InvokerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(message) => InvokerError::ConnectionFailed { message },
            TransportError::Timeout => InvokerError::Timeout {
                duration: std::time::Duration::from_secs(0),
            },
            TransportError::Request(message) => InvokerError::Other { message },
        }
    }
}
