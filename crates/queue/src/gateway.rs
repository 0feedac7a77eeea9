//! Task queue gateway trait and types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use cairn_core::{BatchId, JobSpec};

use crate::error::QueueError;

/// Lifecycle of a submitted batch as reported by the queue backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    NotStarted,
    InProgress,
    Stopped,
    Completed,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::NotStarted => "NOT_STARTED",
            TaskState::InProgress => "IN_PROGRESS",
            TaskState::Stopped => "STOPPED",
            TaskState::Completed => "COMPLETED",
            TaskState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Trait for task queue backends.
///
/// One queue exists per job type. The scheduler primes every queue on each
/// pass and then hands whole batches to [`submit`](TaskQueueGateway::submit);
/// the backend decides how jobs fan out to workers, honouring the
/// per-instance concurrency cap.
#[async_trait]
pub trait TaskQueueGateway: Send + Sync {
    /// Create the queue for `job_type` if it does not exist yet. Must be
    /// idempotent: calling it every pass is the normal case.
    async fn ensure_queue_exists(&self, job_type: &str) -> Result<(), QueueError>;

    /// Submit a non-empty batch of jobs sharing one job type.
    ///
    /// Returns the identifier of the batch.
    async fn submit(
        &self,
        jobs: &[JobSpec],
        max_concurrent_per_instance: u32,
    ) -> Result<BatchId, QueueError>;

    /// Known batches for `job_type` and their state.
    async fn task_states(&self, _job_type: &str) -> Result<HashMap<BatchId, TaskState>, QueueError> {
        Ok(HashMap::new()) // Default: backend does not track batch state
    }

    /// Backend name for logging (e.g. "memory", "sqs").
    fn provider(&self) -> &str;
}

/// Blanket implementation so `Arc<dyn TaskQueueGateway>` can be used directly.
#[async_trait]
impl<T: TaskQueueGateway + ?Sized> TaskQueueGateway for Arc<T> {
    async fn ensure_queue_exists(&self, job_type: &str) -> Result<(), QueueError> {
        (**self).ensure_queue_exists(job_type).await
    }

    async fn submit(
        &self,
        jobs: &[JobSpec],
        max_concurrent_per_instance: u32,
    ) -> Result<BatchId, QueueError> {
        (**self).submit(jobs, max_concurrent_per_instance).await
    }

    async fn task_states(&self, job_type: &str) -> Result<HashMap<BatchId, TaskState>, QueueError> {
        (**self).task_states(job_type).await
    }

    fn provider(&self) -> &str {
        (**self).provider()
    }
}

/// Job type shared by every job in the batch.
pub(crate) fn batch_job_type(jobs: &[JobSpec]) -> Result<&str, QueueError> {
    let first = jobs.first().ok_or(QueueError::EmptyBatch)?.job_type();
    if let Some(other) = jobs.iter().find(|j| j.job_type() != first) {
        return Err(QueueError::MixedBatch {
            expected: first.to_string(),
            found: other.job_type().to_string(),
        });
    }
    Ok(first)
}

/// `Task_<jobType>_<epochMillis>_<suffix>`.
pub(crate) fn new_batch_id(job_type: &str) -> BatchId {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("Task_{}_{}_{}", job_type, Utc::now().timestamp_millis(), &suffix[..8])
}
