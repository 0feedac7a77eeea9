use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier the task queue hands back for a submitted batch.
pub type BatchId = String;

/// Well-known job parameter: the (typed) table the job operates on.
pub const TABLE_NAME_KEY: &str = "tableName";

/// A single unit of background work produced by a generator.
///
/// The scheduler never looks inside `configs`; only the generator and the
/// worker that eventually runs the job agree on its keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    job_type: String,
    configs: BTreeMap<String, String>,
}

impl JobSpec {
    pub fn new(job_type: impl Into<String>, configs: BTreeMap<String, String>) -> Self {
        Self {
            job_type: job_type.into(),
            configs,
        }
    }

    /// A job targeting one table, with any extra parameters layered on top.
    pub fn for_table(
        job_type: impl Into<String>,
        table_name_with_type: impl Into<String>,
        extra: &BTreeMap<String, String>,
    ) -> Self {
        let mut configs = extra.clone();
        configs.insert(TABLE_NAME_KEY.to_string(), table_name_with_type.into());
        Self::new(job_type, configs)
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn configs(&self) -> &BTreeMap<String, String> {
        &self.configs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.configs.get(key).map(|s| s.as_str())
    }

    pub fn table_name(&self) -> Option<&str> {
        self.get(TABLE_NAME_KEY)
    }
}
