//! Core prediction types.

mod batch;
mod request;
mod response;

pub use batch::{BatchJob, DEFAULT_BATCH_SIZE};
pub use request::PredictionRequest;
pub use response::{PredictionResponse, RawPrediction};
