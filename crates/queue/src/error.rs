//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("refusing to submit an empty batch")]
    EmptyBatch,

    #[error("batch mixes job types: expected {expected}, found {found}")]
    MixedBatch { expected: String, found: String },

    #[error("submit error: {0}")]
    Submit(String),

    /// Some jobs reached the queue before a later send failed.
    #[error("batch {batch_id} partially submitted ({sent} of {total} jobs sent): {reason}")]
    PartialSubmit {
        batch_id: String,
        sent: usize,
        total: usize,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider error: {0}")]
    Provider(String),
}

impl QueueError {
    /// Batch id of a partially submitted batch.
    pub fn batch_id(&self) -> Option<&str> {
        match self {
            QueueError::PartialSubmit { batch_id, .. } => Some(batch_id),
            _ => None,
        }
    }
}
