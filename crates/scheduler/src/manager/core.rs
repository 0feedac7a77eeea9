use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use cairn_queue::TaskQueueGateway;

use crate::cluster::{ClusterInfo, LeadershipOracle, TableDirectory};
use crate::error::SchedulerError;
use crate::generator::TaskGenerator;
use crate::metrics::MetricsSink;
use crate::periodic::PeriodicTask;
use crate::registry::{RegistrationPolicy, TaskGeneratorRegistry};

/// Periodically turns table configs into queued job batches.
///
/// Only the leader controller schedules. Every registered job type gets its
/// queue primed on each pass, then its generator is handed the tables that
/// enabled it and the resulting jobs are submitted as one batch.
pub struct TaskManager {
    pub(super) leadership: Arc<dyn LeadershipOracle>,
    pub(super) tables: Arc<dyn TableDirectory>,
    pub(super) queue: Arc<dyn TaskQueueGateway>,
    pub(super) metrics: Arc<dyn MetricsSink>,
    pub(super) registry: TaskGeneratorRegistry,
    cluster_info: ClusterInfo,
}

impl TaskManager {
    pub fn new(
        leadership: Arc<dyn LeadershipOracle>,
        tables: Arc<dyn TableDirectory>,
        queue: Arc<dyn TaskQueueGateway>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let cluster_info = ClusterInfo::new(Arc::clone(&tables), Arc::clone(&queue));
        Self {
            leadership,
            tables,
            queue,
            metrics,
            registry: TaskGeneratorRegistry::default(),
            cluster_info,
        }
    }

    /// Replace the registry with an empty one using `policy`.
    ///
    /// Generators registered before this call are dropped.
    pub fn with_registration_policy(mut self, policy: RegistrationPolicy) -> Self {
        if !self.registry.is_empty() {
            warn!(dropped = self.registry.len(), "Registration policy changed after generators were registered");
        }
        self.registry = TaskGeneratorRegistry::new(policy);
        self
    }

    /// Read-only cluster view to hand to generators at construction.
    pub fn cluster_info(&self) -> ClusterInfo {
        self.cluster_info.clone()
    }

    pub fn registry(&self) -> &TaskGeneratorRegistry {
        &self.registry
    }

    /// Make a generator's job type schedulable from the next pass on.
    pub fn register_task_generator(&self, generator: Arc<dyn TaskGenerator>) -> Result<(), SchedulerError> {
        self.registry.register(generator).map(|_| ())
    }

    pub async fn is_leader(&self) -> bool {
        self.leadership.is_leader().await
    }

    pub fn queue_provider(&self) -> &str {
        self.queue.provider()
    }
}

#[async_trait]
impl PeriodicTask for TaskManager {
    fn name(&self) -> &str {
        "TaskManager"
    }

    async fn init_task(&self, interval: Duration) {
        info!(
            "Starting task manager with running frequency of {} seconds",
            interval.as_secs()
        );
    }

    async fn run_task(&self) {
        match self.schedule_tasks_report().await {
            Ok(report) if report.leader => {
                info!(
                    scheduled = report.scheduled.len(),
                    failed = report.failed.len(),
                    duration_ms = report.duration_ms,
                    "Task scheduling pass finished"
                );
            }
            Ok(_) => {}
            Err(e) => error!("Task scheduling pass failed: {}", e),
        }
    }
}
