use async_trait::async_trait;

use cairn_core::{JobSpec, TableConfig};

use crate::error::GeneratorError;

/// Produces the jobs of one job type.
///
/// The task manager hands each generator the tables that enabled its job
/// type and submits whatever comes back. Generators may read cluster state
/// through [`ClusterInfo`](crate::cluster::ClusterInfo) but never submit jobs
/// or touch table configs themselves.
#[async_trait]
pub trait TaskGenerator: Send + Sync {
    /// Registration key; also names the job type's queue.
    fn job_type(&self) -> &str;

    /// Upper bound on jobs of this type a single worker runs at once.
    fn max_concurrent_tasks_per_instance(&self) -> u32 {
        1
    }

    /// Build the jobs for this pass. `tables` keeps the directory's listing
    /// order. Returning an empty vec means there is nothing to do.
    async fn generate_tasks(&self, tables: &[TableConfig]) -> Result<Vec<JobSpec>, GeneratorError>;
}
