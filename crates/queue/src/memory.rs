//! In-process task queue, used for local mode and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use cairn_core::{BatchId, JobSpec};

use crate::error::QueueError;
use crate::gateway::{batch_job_type, new_batch_id, TaskQueueGateway, TaskState};

/// A batch as recorded by [`InMemoryTaskQueue`].
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedBatch {
    pub batch_id: BatchId,
    pub job_type: String,
    pub jobs: Vec<JobSpec>,
    pub max_concurrent_per_instance: u32,
    pub submitted_at: DateTime<Utc>,
    pub state: TaskState,
}

#[derive(Debug, Default)]
struct QueueState {
    batches: Vec<SubmittedBatch>,
}

/// Keeps one queue per job type in memory.
///
/// Submitting to a queue that was never ensured fails with
/// [`QueueError::QueueNotFound`], which is what a real workflow engine does.
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    queues: RwLock<HashMap<String, QueueState>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all queues created so far, sorted.
    pub async fn queue_names(&self) -> Vec<String> {
        let queues = self.queues.read().await;
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Batches submitted for `job_type`, oldest first.
    pub async fn batches(&self, job_type: &str) -> Vec<SubmittedBatch> {
        let queues = self.queues.read().await;
        queues
            .get(job_type)
            .map(|q| q.batches.clone())
            .unwrap_or_default()
    }

    /// Move a batch to a new state (workers report progress through this).
    pub async fn update_state(&self, batch_id: &str, state: TaskState) -> Result<(), QueueError> {
        let mut queues = self.queues.write().await;
        let batch = queues
            .values_mut()
            .flat_map(|q| q.batches.iter_mut())
            .find(|b| b.batch_id == batch_id)
            .ok_or_else(|| QueueError::Provider(format!("unknown batch {batch_id}")))?;
        batch.state = state;
        Ok(())
    }
}

#[async_trait]
impl TaskQueueGateway for InMemoryTaskQueue {
    async fn ensure_queue_exists(&self, job_type: &str) -> Result<(), QueueError> {
        let mut queues = self.queues.write().await;
        if !queues.contains_key(job_type) {
            queues.insert(job_type.to_string(), QueueState::default());
            info!(job_type, "Created in-memory task queue");
        }
        Ok(())
    }

    async fn submit(
        &self,
        jobs: &[JobSpec],
        max_concurrent_per_instance: u32,
    ) -> Result<BatchId, QueueError> {
        let job_type = batch_job_type(jobs)?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(job_type)
            .ok_or_else(|| QueueError::QueueNotFound(job_type.to_string()))?;

        let batch_id = new_batch_id(job_type);
        debug!(job_type, batch_id = %batch_id, num_jobs = jobs.len(), "Enqueued batch");
        queue.batches.push(SubmittedBatch {
            batch_id: batch_id.clone(),
            job_type: job_type.to_string(),
            jobs: jobs.to_vec(),
            max_concurrent_per_instance,
            submitted_at: Utc::now(),
            state: TaskState::NotStarted,
        });
        Ok(batch_id)
    }

    async fn task_states(&self, job_type: &str) -> Result<HashMap<BatchId, TaskState>, QueueError> {
        let queues = self.queues.read().await;
        Ok(queues
            .get(job_type)
            .map(|q| {
                q.batches
                    .iter()
                    .map(|b| (b.batch_id.clone(), b.state))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn provider(&self) -> &str {
        "memory"
    }
}
