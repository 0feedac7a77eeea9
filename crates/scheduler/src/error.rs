use thiserror::Error;

use cairn_core::CairnError;
use cairn_queue::QueueError;

/// Error returned by a [`TaskGenerator`](crate::generator::TaskGenerator).
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generation failed: {0}")]
    Failed(String),

    #[error("cluster info unavailable: {0}")]
    ClusterInfo(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no task generator registered for job type {0}")]
    UnknownJobType(String),

    #[error("task generator already registered for job type {0}")]
    DuplicateJobType(String),

    #[error("run interval must be a positive number of seconds, got {0}")]
    InvalidInterval(i64),

    #[error("table directory error: {0}")]
    TableDirectory(#[from] CairnError),

    #[error("generator for {job_type} failed: {source}")]
    Generator {
        job_type: String,
        #[source]
        source: GeneratorError,
    },

    #[error("task queue error for {job_type}: {source}")]
    Queue {
        job_type: String,
        #[source]
        source: QueueError,
    },

    #[error("scheduling branch for {job_type} aborted: {message}")]
    Join { job_type: String, message: String },
}

impl SchedulerError {
    /// Job type the error is scoped to, if any.
    pub fn job_type(&self) -> Option<&str> {
        match self {
            SchedulerError::UnknownJobType(t) | SchedulerError::DuplicateJobType(t) => Some(t),
            SchedulerError::Generator { job_type, .. }
            | SchedulerError::Queue { job_type, .. }
            | SchedulerError::Join { job_type, .. } => Some(job_type),
            _ => None,
        }
    }
}
