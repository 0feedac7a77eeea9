use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use cairn_core::{CairnError, JobSpec, TableConfig, TableType, TaskConfig};
use cairn_queue::InMemoryTaskQueue;

use crate::cluster::{StaticLeadership, TableDirectory};
use crate::directory::InMemoryTableDirectory;
use crate::error::GeneratorError;
use crate::generator::TaskGenerator;
use crate::metrics::{InMemoryMetrics, SCHEDULE_TASKS_CALLED, TASKS_SUBMITTED, TASK_GENERATION_FAILURES};
use crate::periodic::PeriodicTask;
use crate::registry::RegistrationPolicy;

use super::TaskManager;

/// One job per table it is handed.
struct OnePerTable {
    job_type: String,
    concurrency: u32,
}

impl OnePerTable {
    fn new(job_type: &str) -> Arc<Self> {
        Arc::new(Self {
            job_type: job_type.to_string(),
            concurrency: 2,
        })
    }
}

#[async_trait]
impl TaskGenerator for OnePerTable {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    fn max_concurrent_tasks_per_instance(&self) -> u32 {
        self.concurrency
    }

    async fn generate_tasks(&self, tables: &[TableConfig]) -> Result<Vec<JobSpec>, GeneratorError> {
        Ok(tables
            .iter()
            .map(|t| JobSpec::for_table(&self.job_type, t.table_name_with_type(), &BTreeMap::new()))
            .collect())
    }
}

struct Failing(&'static str);

#[async_trait]
impl TaskGenerator for Failing {
    fn job_type(&self) -> &str {
        self.0
    }

    async fn generate_tasks(&self, _tables: &[TableConfig]) -> Result<Vec<JobSpec>, GeneratorError> {
        Err(GeneratorError::Failed("segment store unreachable".into()))
    }
}

struct Harness {
    manager: TaskManager,
    tables: Arc<InMemoryTableDirectory>,
    queue: Arc<InMemoryTaskQueue>,
    metrics: Arc<InMemoryMetrics>,
    leadership: Arc<StaticLeadership>,
}

fn harness() -> Harness {
    let tables = Arc::new(InMemoryTableDirectory::new());
    let queue = Arc::new(InMemoryTaskQueue::new());
    let metrics = Arc::new(InMemoryMetrics::new());
    let leadership = Arc::new(StaticLeadership::new(true));
    let manager = TaskManager::new(leadership.clone(), tables.clone(), queue.clone(), metrics.clone());
    Harness {
        manager,
        tables,
        queue,
        metrics,
        leadership,
    }
}

fn table(name: &str, types: &[&str]) -> TableConfig {
    let task = types.iter().fold(TaskConfig::new(), |tc, t| tc.enable(*t));
    TableConfig::new(name, TableType::Offline).with_task_config(task)
}

#[tokio::test]
async fn schedules_one_batch_per_type_with_jobs() {
    let h = harness();
    h.tables.insert(table("t1", &["merge"])).await;
    h.tables.insert(table("t2", &["purge"])).await;
    h.tables.insert(table("t3", &["merge", "purge"])).await;
    h.manager.register_task_generator(OnePerTable::new("merge")).unwrap();

    let result = h.manager.schedule_tasks().await.unwrap();
    assert_eq!(result.len(), 1);

    let batches = h.queue.batches("merge").await;
    assert_eq!(batches.len(), 1);
    assert_eq!(result["merge"], batches[0].batch_id);
    assert_eq!(batches[0].max_concurrent_per_instance, 2);
    let submitted: Vec<_> = batches[0].jobs.iter().filter_map(|j| j.table_name()).collect();
    assert_eq!(submitted, vec!["t1_OFFLINE", "t3_OFFLINE"]);

    assert_eq!(h.metrics.tagged_counter("merge", TASKS_SUBMITTED), 2);
    assert_eq!(h.metrics.counter(SCHEDULE_TASKS_CALLED), 1);
}

#[tokio::test]
async fn non_leader_pass_counts_but_does_nothing() {
    let h = harness();
    h.leadership.set_leader(false);
    h.tables.insert(table("t1", &["merge"])).await;
    h.manager.register_task_generator(OnePerTable::new("merge")).unwrap();

    let report = h.manager.schedule_tasks_report().await.unwrap();
    assert!(!report.leader);
    assert!(report.scheduled.is_empty());
    assert!(h.queue.queue_names().await.is_empty());
    assert_eq!(h.metrics.counter(SCHEDULE_TASKS_CALLED), 1);

    h.leadership.set_leader(true);
    assert_eq!(h.manager.schedule_tasks().await.unwrap().len(), 1);
    assert_eq!(h.metrics.counter(SCHEDULE_TASKS_CALLED), 2);
}

#[tokio::test]
async fn failing_type_is_reported_and_counted() {
    let h = harness();
    h.tables.insert(table("t1", &["merge", "convert"])).await;
    h.manager.register_task_generator(OnePerTable::new("merge")).unwrap();
    h.manager.register_task_generator(Arc::new(Failing("convert"))).unwrap();

    let report = h.manager.schedule_tasks_report().await.unwrap();
    assert!(report.scheduled.contains_key("merge"));
    assert!(!report.scheduled.contains_key("convert"));
    assert!(!report.is_clean());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].job_type, "convert");
    assert!(report.failed[0].error.contains("segment store unreachable"));

    assert_eq!(h.metrics.tagged_counter("convert", TASK_GENERATION_FAILURES), 1);
    assert_eq!(h.metrics.tagged_counter("merge", TASK_GENERATION_FAILURES), 0);
    assert_eq!(h.queue.queue_names().await, vec!["convert", "merge"]);
}

#[tokio::test]
async fn missing_and_broken_configs_are_skipped() {
    let h = harness();
    h.tables.insert_missing("gone").await;
    h.tables.insert_broken("flaky", "zk session expired").await;
    h.tables.insert(table("ok", &["merge"])).await;
    h.manager.register_task_generator(OnePerTable::new("merge")).unwrap();

    let eligible = h.manager.eligible_tables().await.unwrap();
    let names: Vec<_> = eligible["merge"].iter().map(|t| t.table_name.as_str()).collect();
    assert_eq!(names, vec!["ok"]);

    let report = h.manager.schedule_tasks_report().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.scheduled.len(), 1);
}

struct UnlistableTables;

#[async_trait]
impl TableDirectory for UnlistableTables {
    async fn list_all_table_names(&self) -> Result<Vec<String>, CairnError> {
        Err(CairnError::Other("property store down".into()))
    }

    async fn get_table_config(&self, _table_name: &str) -> Result<Option<TableConfig>, CairnError> {
        Ok(None)
    }
}

#[tokio::test]
async fn table_listing_failure_fails_the_pass_after_priming() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let manager = TaskManager::new(
        Arc::new(StaticLeadership::new(true)),
        Arc::new(UnlistableTables),
        queue.clone(),
        Arc::new(InMemoryMetrics::new()),
    );
    manager.register_task_generator(OnePerTable::new("merge")).unwrap();

    let err = manager.schedule_tasks().await.unwrap_err();
    assert!(err.to_string().contains("property store down"));
    assert_eq!(queue.queue_names().await, vec!["merge"]);
}

#[tokio::test]
async fn reject_policy_applies_to_manager_registration() {
    let h = harness();
    let manager = h.manager.with_registration_policy(RegistrationPolicy::Reject);
    manager.register_task_generator(OnePerTable::new("merge")).unwrap();
    assert!(manager.register_task_generator(OnePerTable::new("merge")).is_err());
    assert_eq!(manager.registry().len(), 1);
}

#[tokio::test]
async fn run_task_swallows_pass_errors() {
    let manager = TaskManager::new(
        Arc::new(StaticLeadership::new(true)),
        Arc::new(UnlistableTables),
        Arc::new(InMemoryTaskQueue::new()),
        Arc::new(InMemoryMetrics::new()),
    );
    manager.register_task_generator(OnePerTable::new("merge")).unwrap();
    assert_eq!(manager.name(), "TaskManager");
    manager.run_task().await;
}

#[tokio::test]
async fn cluster_info_sees_the_manager_tables() {
    let h = harness();
    h.tables.insert(table("t1", &[])).await;
    let info = h.manager.cluster_info();
    assert_eq!(info.all_table_names().await.unwrap(), vec!["t1"]);
    assert_eq!(h.manager.queue_provider(), "memory");
}
