//! The remote call seam of the prediction client.
//!
//! The orchestrator never talks to the network itself. Anything that can
//! turn a [`PredictionRequest`] into a [`RawPrediction`] implements
//! [`RemoteInvoker`]: the HTTP-backed [`RestInvoker`] for real endpoints,
//! [`MockInvoker`](crate::mocks::MockInvoker) in tests.

mod rest;

pub use rest::RestInvoker;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::InvokerError;
use crate::types::{PredictionRequest, RawPrediction};

/// Performs one prediction call against a deployed model.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    /// Sends `request` and returns the raw result.
    ///
    /// `timeout` is the per-call budget. The orchestrator also enforces it
    /// from outside, so implementations may treat it as a hint.
    async fn invoke(
        &self,
        request: &PredictionRequest,
        timeout: Duration,
    ) -> Result<RawPrediction, InvokerError>;
}
