use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use cairn_core::{BatchId, TableConfig};
use cairn_queue::TaskQueueGateway;

use crate::error::SchedulerError;
use crate::generator::TaskGenerator;
use crate::metrics::{MetricsSink, SCHEDULE_TASKS_CALLED, TASKS_SUBMITTED, TASK_GENERATION_FAILURES};

use super::{ScheduleReport, TaskManager, TypeFailure};

type Generators = Vec<(String, Arc<dyn TaskGenerator>)>;

impl TaskManager {
    /// Run one scheduling pass and return job type -> batch id for every
    /// type that had jobs submitted.
    ///
    /// Empty when this controller is not the leader. A failing job type is
    /// logged and left out; the other types still run.
    pub async fn schedule_tasks(&self) -> Result<HashMap<String, BatchId>, SchedulerError> {
        Ok(self.schedule_tasks_report().await?.scheduled.into_iter().collect())
    }

    /// Same pass as [`schedule_tasks`](Self::schedule_tasks), also reporting
    /// per-type failures and timing.
    ///
    /// Only a failure to list tables fails the whole pass.
    pub async fn schedule_tasks_report(&self) -> Result<ScheduleReport, SchedulerError> {
        let clock = Instant::now();
        let started_at = Utc::now();
        self.metrics.increment_counter(SCHEDULE_TASKS_CALLED);

        if !self.leadership.is_leader().await {
            info!("Skip scheduling new tasks on non-leader controller");
            return Ok(ScheduleReport::new(false, started_at));
        }

        let mut report = ScheduleReport::new(true, started_at);
        let generators = self.prime_queues(self.registry.snapshot(), &mut report).await;
        let job_types: Vec<String> = generators.iter().map(|(t, _)| t.clone()).collect();
        let mut eligible = self.scan_eligible_tables(&job_types).await?;

        // One task per job type; a panicking generator surfaces as a JoinError.
        let mut branches = Vec::with_capacity(generators.len());
        for (job_type, generator) in generators {
            let tables = eligible.remove(&job_type).unwrap_or_default();
            let handle = tokio::spawn(generate_and_submit(
                job_type.clone(),
                generator,
                tables,
                Arc::clone(&self.queue),
                Arc::clone(&self.metrics),
            ));
            branches.push((job_type, handle));
        }

        for (job_type, handle) in branches {
            let outcome = handle.await.unwrap_or_else(|e| {
                Err(SchedulerError::Join {
                    job_type: job_type.clone(),
                    message: e.to_string(),
                })
            });
            match outcome {
                Ok(Some(batch_id)) => {
                    report.scheduled.insert(job_type, batch_id);
                }
                Ok(None) => {}
                Err(e) => self.record_failure(&mut report, job_type, e),
            }
        }

        report.duration_ms = clock.elapsed().as_millis() as u64;
        debug!(
            scheduled = report.scheduled.len(),
            failed = report.failed.len(),
            duration_ms = report.duration_ms,
            "Scheduling pass complete"
        );
        Ok(report)
    }

    /// Tables eligible for each registered job type, as the next pass would
    /// see them. Does not touch the queue.
    pub async fn eligible_tables(&self) -> Result<BTreeMap<String, Vec<TableConfig>>, SchedulerError> {
        let job_types: Vec<String> = self.registry.all_task_types().into_iter().collect();
        Ok(self.scan_eligible_tables(&job_types).await?.into_iter().collect())
    }

    /// Ensure every job type's queue exists. Types whose queue cannot be
    /// ensured are recorded as failed and dropped from this pass.
    async fn prime_queues(&self, generators: Generators, report: &mut ScheduleReport) -> Generators {
        let mut primed = Vec::with_capacity(generators.len());
        for (job_type, generator) in generators {
            match self.queue.ensure_queue_exists(&job_type).await {
                Ok(()) => primed.push((job_type, generator)),
                Err(source) => {
                    let err = SchedulerError::Queue {
                        job_type: job_type.clone(),
                        source,
                    };
                    self.record_failure(report, job_type, err);
                }
            }
        }
        primed
    }

    /// Walk every table once and bucket its config under each job type it
    /// enables. Listing order is kept within each bucket.
    async fn scan_eligible_tables(
        &self,
        job_types: &[String],
    ) -> Result<HashMap<String, Vec<TableConfig>>, SchedulerError> {
        let mut eligible: HashMap<String, Vec<TableConfig>> =
            job_types.iter().map(|t| (t.clone(), Vec::new())).collect();
        if job_types.is_empty() {
            return Ok(eligible);
        }

        let table_names = self.tables.list_all_table_names().await?;
        for table_name in table_names {
            let config = match self.tables.get_table_config(&table_name).await {
                Ok(Some(config)) => config,
                Ok(None) => {
                    debug!(table = %table_name, "Table config not found, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(table = %table_name, error = %e, "Failed to fetch table config, skipping");
                    continue;
                }
            };
            let Some(task_config) = config.task_config() else {
                continue;
            };
            for job_type in job_types {
                if task_config.is_task_type_enabled(job_type) {
                    if let Some(tables) = eligible.get_mut(job_type) {
                        tables.push(config.clone());
                    }
                }
            }
        }
        Ok(eligible)
    }

    fn record_failure(&self, report: &mut ScheduleReport, job_type: String, err: SchedulerError) {
        error!(job_type = %job_type, error = %err, "Failed to schedule tasks");
        self.metrics.add_to_tagged_counter(&job_type, TASK_GENERATION_FAILURES, 1);
        report.failed.push(TypeFailure {
            job_type,
            error: err.to_string(),
        });
    }
}

/// Generate one job type's batch and submit it. `Ok(None)` when the
/// generator had nothing to do.
async fn generate_and_submit(
    job_type: String,
    generator: Arc<dyn TaskGenerator>,
    tables: Vec<TableConfig>,
    queue: Arc<dyn TaskQueueGateway>,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Option<BatchId>, SchedulerError> {
    debug!(job_type = %job_type, tables = tables.len(), "Generating tasks");
    let jobs = generator
        .generate_tasks(&tables)
        .await
        .map_err(|source| SchedulerError::Generator {
            job_type: job_type.clone(),
            source,
        })?;

    if jobs.is_empty() {
        debug!(job_type = %job_type, "No tasks generated");
        return Ok(None);
    }

    let max_concurrent = generator.max_concurrent_tasks_per_instance().max(1);
    let batch_id = queue
        .submit(&jobs, max_concurrent)
        .await
        .map_err(|source| SchedulerError::Queue {
            job_type: job_type.clone(),
            source,
        })?;

    metrics.add_to_tagged_counter(&job_type, TASKS_SUBMITTED, jobs.len() as u64);
    info!(
        job_type = %job_type,
        batch_id = %batch_id,
        jobs = jobs.len(),
        max_concurrent,
        "Submitted task batch"
    );
    Ok(Some(batch_id))
}
