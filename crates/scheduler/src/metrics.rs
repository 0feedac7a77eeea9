use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Serialize;

/// Incremented on every scheduling pass, leader or not.
pub const SCHEDULE_TASKS_CALLED: &str = "schedule_tasks_called";
/// Tagged by job type; amount is the number of jobs in the submitted batch.
pub const TASKS_SUBMITTED: &str = "tasks_submitted";
/// Tagged by job type; one per failed ensure, generate or submit.
pub const TASK_GENERATION_FAILURES: &str = "task_generation_failures";

/// Where the task manager reports its counters.
///
/// Injected at construction so the manager never reaches for global state.
pub trait MetricsSink: Send + Sync {
    fn increment_counter(&self, name: &str);

    fn add_to_tagged_counter(&self, tag: &str, name: &str, amount: u64);
}

/// Point-in-time copy of [`InMemoryMetrics`], served by the admin API.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    /// name -> tag -> value
    pub tagged_counters: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Counters kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    inner: RwLock<MetricsSnapshot>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.inner
            .read()
            .map(|m| m.counters.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn tagged_counter(&self, tag: &str, name: &str) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|m| m.tagged_counters.get(name).and_then(|t| t.get(tag)).copied())
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.read().map(|m| m.clone()).unwrap_or_default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment_counter(&self, name: &str) {
        if let Ok(mut m) = self.inner.write() {
            *m.counters.entry(name.to_string()).or_default() += 1;
        }
    }

    fn add_to_tagged_counter(&self, tag: &str, name: &str, amount: u64) {
        if let Ok(mut m) = self.inner.write() {
            *m.tagged_counters
                .entry(name.to_string())
                .or_default()
                .entry(tag.to_string())
                .or_default() += amount;
        }
    }
}
