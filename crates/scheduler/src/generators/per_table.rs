use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info};

use cairn_core::{JobSpec, TableConfig};

use crate::cluster::ClusterInfo;
use crate::error::GeneratorError;
use crate::generator::TaskGenerator;

/// Emits one job per eligible table, carrying the table's per-type settings
/// from its task config plus the typed table name.
pub struct PerTableTaskGenerator {
    job_type: String,
    max_concurrent: u32,
    /// Set when the generator should hold off while earlier batches are pending.
    in_flight_guard: Option<ClusterInfo>,
}

impl PerTableTaskGenerator {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            max_concurrent: 1,
            in_flight_guard: None,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_concurrent(mut self, max_concurrent: u32) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn skip_when_in_flight(mut self, cluster_info: ClusterInfo) -> Self {
        self.in_flight_guard = Some(cluster_info);
        self
    }
}

#[async_trait]
impl TaskGenerator for PerTableTaskGenerator {
    fn job_type(&self) -> &str {
        &self.job_type
    }

    fn max_concurrent_tasks_per_instance(&self) -> u32 {
        self.max_concurrent
    }

    async fn generate_tasks(&self, tables: &[TableConfig]) -> Result<Vec<JobSpec>, GeneratorError> {
        if tables.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(cluster_info) = &self.in_flight_guard {
            if cluster_info.has_in_flight_batches(&self.job_type).await? {
                info!(job_type = %self.job_type, "Earlier batch still in flight, not generating");
                return Ok(Vec::new());
            }
        }

        let empty = BTreeMap::new();
        let jobs: Vec<JobSpec> = tables
            .iter()
            .map(|table| {
                let settings = table
                    .task_config()
                    .and_then(|tc| tc.config_for(&self.job_type))
                    .unwrap_or(&empty);
                JobSpec::for_table(&self.job_type, table.table_name_with_type(), settings)
            })
            .collect();

        debug!(job_type = %self.job_type, jobs = jobs.len(), "Generated per-table jobs");
        Ok(jobs)
    }
}
