//! AWS SQS-backed task queue.
//!
//! Each job type maps to one SQS queue named `{prefix}{job_type}`. A batch is
//! sent as one message per job; every message carries the batch id and the
//! per-instance concurrency cap as message attributes so the worker side can
//! throttle itself.
//!
//! SQS has no notion of a batch, so [`task_states`](TaskQueueGateway::task_states)
//! derives one state from the queue backlog and attributes it to the latest
//! batch this process submitted for the job type.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::BehaviorVersion;
use aws_sdk_sqs::types::{MessageAttributeValue, QueueAttributeName, SendMessageBatchRequestEntry};
use aws_sdk_sqs::Client;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use cairn_core::config::{AwsConfig, QueueConfig};
use cairn_core::{BatchId, JobSpec};

use crate::error::QueueError;
use crate::gateway::{batch_job_type, new_batch_id, TaskQueueGateway, TaskState};

/// SQS caps batch sends at 10 entries.
const SQS_MAX_BATCH_ENTRIES: usize = 10;

pub struct SqsTaskQueue {
    client: Client,
    queue: QueueConfig,
    /// job type -> queue URL, filled by `ensure_queue_exists`.
    queue_urls: RwLock<HashMap<String, String>>,
    /// job type -> most recent batch submitted from this process.
    last_batches: RwLock<HashMap<String, BatchId>>,
}

impl SqsTaskQueue {
    /// Create a new SQS task queue from project config.
    pub async fn new(aws: &AwsConfig, queue: &QueueConfig) -> Result<Self, QueueError> {
        let region = aws_sdk_sqs::config::Region::new(aws.region.clone());

        // Built directly rather than through aws_config::defaults(), which
        // would also pick up AWS_ENDPOINT_URL from the environment.
        let mut sqs_config = aws_sdk_sqs::Config::builder()
            .region(region.clone())
            .behavior_version(BehaviorVersion::latest());

        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "cairn-queue-static",
            );
            sqs_config = sqs_config.credentials_provider(creds);
        } else {
            // Default credential chain (env, profile, SSO, instance role).
            let chain = DefaultCredentialsChain::builder().region(region).build().await;
            sqs_config = sqs_config.credentials_provider(chain);
        }

        if let Some(url) = endpoint_override(aws) {
            sqs_config = sqs_config.endpoint_url(&url);
        }

        let client = Client::from_conf(sqs_config.build());

        info!(
            region = %aws.region,
            prefix = %queue.name_prefix,
            "SQS task queue initialized"
        );

        Ok(Self {
            client,
            queue: queue.clone(),
            queue_urls: RwLock::new(HashMap::new()),
            last_batches: RwLock::new(HashMap::new()),
        })
    }

    async fn queue_url(&self, job_type: &str) -> Result<String, QueueError> {
        if let Some(url) = self.queue_urls.read().await.get(job_type) {
            return Ok(url.clone());
        }

        let name = self.queue.queue_name(job_type);
        let resp = self
            .client
            .get_queue_url()
            .queue_name(&name)
            .send()
            .await
            .map_err(|e| QueueError::QueueNotFound(format!("{name}: {e:?}")))?;
        let url = resp
            .queue_url()
            .ok_or_else(|| QueueError::QueueNotFound(name.clone()))?
            .to_string();

        self.queue_urls
            .write()
            .await
            .insert(job_type.to_string(), url.clone());
        Ok(url)
    }

    /// Build every entry of the batch up front so a bad job fails the batch
    /// before anything is sent.
    fn build_entries(
        jobs: &[JobSpec],
        job_type: &str,
        batch_id: &str,
        max_concurrent_per_instance: u32,
    ) -> Result<Vec<SendMessageBatchRequestEntry>, QueueError> {
        let mut entries = Vec::with_capacity(jobs.len());
        for (i, job) in jobs.iter().enumerate() {
            let mut attributes = HashMap::new();
            attributes.insert("batchId".to_string(), string_attribute("String", batch_id.to_string())?);
            attributes.insert("jobType".to_string(), string_attribute("String", job_type.to_string())?);
            attributes.insert(
                "maxConcurrentPerInstance".to_string(),
                string_attribute("Number", max_concurrent_per_instance.to_string())?,
            );

            let entry = SendMessageBatchRequestEntry::builder()
                .id(i.to_string())
                .message_body(serde_json::to_string(job)?)
                .set_message_attributes(Some(attributes))
                .build()
                .map_err(|e| QueueError::Submit(format!("invalid batch entry: {e}")))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Endpoint from QUEUE_AWS_ENDPOINT_URL only; a bare host gets `https://`.
fn endpoint_override(aws: &AwsConfig) -> Option<String> {
    let endpoint = aws.endpoint_url.as_deref().filter(|e| !e.is_empty())?;
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Some(endpoint.to_string())
    } else {
        Some(format!("https://{endpoint}"))
    }
}

fn string_attribute(data_type: &str, value: String) -> Result<MessageAttributeValue, QueueError> {
    MessageAttributeValue::builder()
        .data_type(data_type)
        .string_value(value)
        .build()
        .map_err(|e| QueueError::Provider(format!("invalid message attribute: {e}")))
}

/// Error for a send that failed after `sent` of `total` jobs were accepted.
fn submit_failure(batch_id: &str, sent: usize, total: usize, reason: String) -> QueueError {
    if sent == 0 {
        QueueError::Submit(format!("batch {batch_id}: {reason}"))
    } else {
        QueueError::PartialSubmit {
            batch_id: batch_id.to_string(),
            sent,
            total,
            reason,
        }
    }
}

/// State of a queue's backlog: messages held by a worker mean work is
/// running, visible ones mean it is waiting, none means it is drained.
fn backlog_state(visible: u64, in_flight: u64) -> TaskState {
    if in_flight > 0 {
        TaskState::InProgress
    } else if visible > 0 {
        TaskState::NotStarted
    } else {
        TaskState::Completed
    }
}

#[async_trait]
impl TaskQueueGateway for SqsTaskQueue {
    async fn ensure_queue_exists(&self, job_type: &str) -> Result<(), QueueError> {
        if self.queue_urls.read().await.contains_key(job_type) {
            return Ok(());
        }

        // CreateQueue returns the existing queue when attributes match.
        let name = self.queue.queue_name(job_type);
        let resp = self
            .client
            .create_queue()
            .queue_name(&name)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS create queue {name} failed: {e:?}")))?;

        let url = resp
            .queue_url()
            .ok_or_else(|| QueueError::Provider(format!("SQS returned no URL for {name}")))?
            .to_string();

        info!(job_type, queue_url = %url, "Task queue ready");
        self.queue_urls
            .write()
            .await
            .insert(job_type.to_string(), url);
        Ok(())
    }

    async fn submit(
        &self,
        jobs: &[JobSpec],
        max_concurrent_per_instance: u32,
    ) -> Result<BatchId, QueueError> {
        let job_type = batch_job_type(jobs)?;
        let queue_url = self.queue_url(job_type).await?;
        let batch_id = new_batch_id(job_type);
        let entries = Self::build_entries(jobs, job_type, &batch_id, max_concurrent_per_instance)?;
        let total = entries.len();
        let mut sent = 0;

        for (chunk_idx, chunk) in entries.chunks(SQS_MAX_BATCH_ENTRIES).enumerate() {
            debug!(job_type, batch_id = %batch_id, chunk = chunk_idx, size = chunk.len(), "Sending SQS batch");

            let resp = match self
                .client
                .send_message_batch()
                .queue_url(&queue_url)
                .set_entries(Some(chunk.to_vec()))
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let err = submit_failure(&batch_id, sent, total, format!("SQS send batch failed: {e:?}"));
                    error!(job_type, batch_id = %batch_id, sent, total, "SQS batch send failed");
                    return Err(err);
                }
            };

            let failed = resp.failed();
            sent += chunk.len() - failed.len();
            if !failed.is_empty() {
                warn!(job_type, batch_id = %batch_id, failed = failed.len(), sent, total, "SQS rejected batch entries");
                return Err(submit_failure(
                    &batch_id,
                    sent,
                    total,
                    format!("{} entries rejected", failed.len()),
                ));
            }
        }

        self.last_batches
            .write()
            .await
            .insert(job_type.to_string(), batch_id.clone());
        Ok(batch_id)
    }

    async fn task_states(&self, job_type: &str) -> Result<HashMap<BatchId, TaskState>, QueueError> {
        let queue_url = self.queue_url(job_type).await?;
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(&queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS get queue attributes failed: {e:?}")))?;

        let count = |name: QueueAttributeName| {
            resp.attributes()
                .and_then(|attrs| attrs.get(&name))
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
        };
        let visible = count(QueueAttributeName::ApproximateNumberOfMessages);
        let in_flight = count(QueueAttributeName::ApproximateNumberOfMessagesNotVisible);
        let state = backlog_state(visible, in_flight);
        debug!(job_type, visible, in_flight, state = %state, "SQS queue backlog");

        let mut states = HashMap::new();
        match self.last_batches.read().await.get(job_type) {
            Some(batch_id) => {
                states.insert(batch_id.clone(), state);
            }
            // Backlog left by an earlier process: report it under the queue name.
            None if state != TaskState::Completed => {
                states.insert(self.queue.queue_name(job_type), state);
            }
            None => {}
        }
        Ok(states)
    }

    fn provider(&self) -> &str {
        "sqs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws(endpoint: Option<&str>) -> AwsConfig {
        AwsConfig {
            region: "us-east-1".into(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: endpoint.map(String::from),
        }
    }

    #[test]
    fn endpoint_comes_only_from_queue_config() {
        assert_eq!(endpoint_override(&aws(None)), None);
        assert_eq!(endpoint_override(&aws(Some(""))), None);
        assert_eq!(
            endpoint_override(&aws(Some("http://localhost:4566"))).as_deref(),
            Some("http://localhost:4566")
        );
        assert_eq!(
            endpoint_override(&aws(Some("sqs.eu-west-1.amazonaws.com"))).as_deref(),
            Some("https://sqs.eu-west-1.amazonaws.com")
        );
    }

    #[test]
    fn backlog_maps_to_batch_state() {
        assert_eq!(backlog_state(0, 3), TaskState::InProgress);
        assert_eq!(backlog_state(5, 1), TaskState::InProgress);
        assert_eq!(backlog_state(5, 0), TaskState::NotStarted);
        assert_eq!(backlog_state(0, 0), TaskState::Completed);
    }

    #[test]
    fn failure_before_any_send_is_a_plain_submit_error() {
        let err = submit_failure("Task_merge_1_ab", 0, 25, "throttled".into());
        assert!(matches!(err, QueueError::Submit(ref msg) if msg.contains("Task_merge_1_ab")));
        assert!(err.batch_id().is_none());
    }

    #[test]
    fn failure_after_a_send_reports_the_partial_batch() {
        let err = submit_failure("Task_merge_1_ab", 10, 25, "throttled".into());
        match &err {
            QueueError::PartialSubmit { batch_id, sent, total, reason } => {
                assert_eq!(batch_id, "Task_merge_1_ab");
                assert_eq!((*sent, *total), (10, 25));
                assert_eq!(reason, "throttled");
            }
            other => panic!("expected PartialSubmit, got {other:?}"),
        }
        assert_eq!(err.batch_id(), Some("Task_merge_1_ab"));
        assert_eq!(
            err.to_string(),
            "batch Task_merge_1_ab partially submitted (10 of 25 jobs sent): throttled"
        );
    }
}
