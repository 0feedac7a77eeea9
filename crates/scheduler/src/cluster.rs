//! Cluster-facing seams the task manager consumes: leadership, the table
//! directory, and the read-only [`ClusterInfo`] facade handed to generators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cairn_core::{BatchId, CairnError, TableConfig};
use cairn_queue::{TaskQueueGateway, TaskState};

use crate::error::GeneratorError;

/// Answers whether this controller is currently the cluster leader.
#[async_trait]
pub trait LeadershipOracle: Send + Sync {
    async fn is_leader(&self) -> bool;
}

/// Leadership fixed by configuration. A standalone controller is always
/// leader; `set_leader` lets an embedding process flip it on failover.
#[derive(Debug)]
pub struct StaticLeadership {
    leader: AtomicBool,
}

impl StaticLeadership {
    pub fn new(leader: bool) -> Self {
        Self {
            leader: AtomicBool::new(leader),
        }
    }

    pub fn set_leader(&self, leader: bool) {
        let was = self.leader.swap(leader, Ordering::SeqCst);
        if was != leader {
            info!(leader, "Controller leadership changed");
        }
    }
}

#[async_trait]
impl LeadershipOracle for StaticLeadership {
    async fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}

/// Read access to the cluster's table configs.
#[async_trait]
pub trait TableDirectory: Send + Sync {
    /// Every table name known to the cluster, in a stable order.
    async fn list_all_table_names(&self) -> Result<Vec<String>, CairnError>;

    /// The config of one table. `Ok(None)` when the table is listed but its
    /// config is gone (deleted between listing and fetch).
    async fn get_table_config(&self, table_name: &str) -> Result<Option<TableConfig>, CairnError>;
}

/// Read-only view of the cluster for generators.
///
/// Wraps the table directory and the task queue without exposing anything
/// that mutates them.
#[derive(Clone)]
pub struct ClusterInfo {
    tables: Arc<dyn TableDirectory>,
    queue: Arc<dyn TaskQueueGateway>,
}

impl ClusterInfo {
    pub fn new(tables: Arc<dyn TableDirectory>, queue: Arc<dyn TaskQueueGateway>) -> Self {
        Self { tables, queue }
    }

    pub async fn table_config(&self, table_name: &str) -> Result<Option<TableConfig>, GeneratorError> {
        self.tables
            .get_table_config(table_name)
            .await
            .map_err(|e| GeneratorError::ClusterInfo(e.to_string()))
    }

    pub async fn all_table_names(&self) -> Result<Vec<String>, GeneratorError> {
        self.tables
            .list_all_table_names()
            .await
            .map_err(|e| GeneratorError::ClusterInfo(e.to_string()))
    }

    /// Batches of `job_type` known to the queue and their state.
    pub async fn task_states(&self, job_type: &str) -> Result<HashMap<BatchId, TaskState>, GeneratorError> {
        self.queue
            .task_states(job_type)
            .await
            .map_err(|e| GeneratorError::ClusterInfo(e.to_string()))
    }

    /// Whether any batch of `job_type` is still waiting or running.
    pub async fn has_in_flight_batches(&self, job_type: &str) -> Result<bool, GeneratorError> {
        Ok(self
            .task_states(job_type)
            .await?
            .values()
            .any(|s| matches!(s, TaskState::NotStarted | TaskState::InProgress)))
    }
}
