//! Batch job: a large request split into fixed-size chunks.

use crate::error::{RequestError, VertexResult};
use super::PredictionRequest;

/// Default number of instances per chunk.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// An ordered sequence of request chunks.
///
/// Each chunk holds at most `batch_size` consecutive instances of the
/// source request (the last may be shorter) and carries the source
/// request's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    batch_size: usize,
    chunks: Vec<PredictionRequest>,
}

impl BatchJob {
    /// Splits `request` into chunks of at most `batch_size` instances.
    ///
    /// An empty request produces a job with no chunks.
    pub fn new(request: PredictionRequest, batch_size: usize) -> VertexResult<Self> {
        if batch_size == 0 {
            return Err(RequestError::InvalidBatchSize { batch_size }.into());
        }

        let (instances, parameters) = request.into_parts();
        let chunks = instances
            .chunks(batch_size)
            .map(|window| {
                let chunk = PredictionRequest::new(window.to_vec());
                match &parameters {
                    Some(params) => chunk.with_parameters(params.clone()),
                    None => chunk,
                }
            })
            .collect();

        Ok(Self { batch_size, chunks })
    }

    /// The chunks, in order.
    pub fn chunks(&self) -> &[PredictionRequest] {
        &self.chunks
    }

    /// Configured chunk size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if there is nothing to submit.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total number of instances across all chunks.
    pub fn instance_count(&self) -> usize {
        self.chunks.iter().map(PredictionRequest::len).sum()
    }
}

impl IntoIterator for BatchJob {
    type Item = PredictionRequest;
    type IntoIter = std::vec::IntoIter<PredictionRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}
