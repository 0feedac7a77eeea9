use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use cairn_core::BatchId;

/// A job type that failed during a pass, with the rendered error.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TypeFailure {
    pub job_type: String,
    pub error: String,
}

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    /// Whether this controller was leader when the pass started.
    pub leader: bool,
    /// Job type -> submitted batch. Types that produced no jobs are absent.
    pub scheduled: BTreeMap<String, BatchId>,
    pub failed: Vec<TypeFailure>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ScheduleReport {
    pub(crate) fn new(leader: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            leader,
            scheduled: BTreeMap::new(),
            failed: Vec::new(),
            started_at,
            duration_ms: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
