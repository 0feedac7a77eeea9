//! Declarative table configuration as seen by the task scheduler.
//!
//! Table configs are owned by the cluster's config store; the scheduler only
//! reads them. The part it cares about is the optional [`TaskConfig`], which
//! lists the job types enabled for the table together with their per-type
//! settings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CairnError;

/// Physical flavour of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableType {
    Offline,
    Realtime,
}

impl TableType {
    pub fn suffix(&self) -> &'static str {
        match self {
            TableType::Offline => "OFFLINE",
            TableType::Realtime => "REALTIME",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Per-table job enablement: job type -> settings for that type.
///
/// A job type is enabled iff it has an entry, even an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    #[serde(default)]
    pub task_type_configs_map: BTreeMap<String, BTreeMap<String, String>>,
}

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a job type with no extra settings.
    pub fn enable(self, job_type: impl Into<String>) -> Self {
        self.enable_with(job_type, BTreeMap::new())
    }

    /// Enable a job type with the given settings.
    pub fn enable_with(mut self, job_type: impl Into<String>, settings: BTreeMap<String, String>) -> Self {
        self.task_type_configs_map.insert(job_type.into(), settings);
        self
    }

    pub fn is_task_type_enabled(&self, job_type: &str) -> bool {
        self.task_type_configs_map.contains_key(job_type)
    }

    pub fn config_for(&self, job_type: &str) -> Option<&BTreeMap<String, String>> {
        self.task_type_configs_map.get(job_type)
    }

    pub fn enabled_task_types(&self) -> impl Iterator<Item = &str> {
        self.task_type_configs_map.keys().map(|s| s.as_str())
    }
}

/// A table's declarative configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub table_name: String,
    pub table_type: TableType,
    #[serde(default, rename = "task", skip_serializing_if = "Option::is_none")]
    pub task_config: Option<TaskConfig>,
}

impl TableConfig {
    pub fn new(table_name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            table_name: table_name.into(),
            table_type,
            task_config: None,
        }
    }

    pub fn with_task_config(mut self, task_config: TaskConfig) -> Self {
        self.task_config = Some(task_config);
        self
    }

    pub fn task_config(&self) -> Option<&TaskConfig> {
        self.task_config.as_ref()
    }

    /// `events` + OFFLINE -> `events_OFFLINE`. Names that already carry the
    /// suffix are returned unchanged.
    pub fn table_name_with_type(&self) -> String {
        let suffix = format!("_{}", self.table_type.suffix());
        if self.table_name.ends_with(&suffix) {
            self.table_name.clone()
        } else {
            format!("{}{}", self.table_name, suffix)
        }
    }

    pub fn is_task_type_enabled(&self, job_type: &str) -> bool {
        self.task_config
            .as_ref()
            .is_some_and(|tc| tc.is_task_type_enabled(job_type))
    }

    pub fn from_json(s: &str) -> Result<Self, CairnError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(s: &str) -> Result<Self, CairnError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config text in the format named by a file extension.
    pub fn parse(content: &str, extension: &str) -> Result<Self, CairnError> {
        match extension {
            "json" => Self::from_json(content),
            "toml" => Self::from_toml(content),
            other => Err(CairnError::UnsupportedFormat(other.to_string())),
        }
    }

    fn validate(&self) -> Result<(), CairnError> {
        if self.table_name.trim().is_empty() {
            return Err(CairnError::InvalidTableConfig("tableName is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enablement_is_key_presence() {
        let tc = TaskConfig::new().enable("merge");
        assert!(tc.is_task_type_enabled("merge"));
        assert!(!tc.is_task_type_enabled("purge"));
    }

    #[test]
    fn table_without_task_config_enables_nothing() {
        let table = TableConfig::new("events", TableType::Offline);
        assert!(!table.is_task_type_enabled("merge"));
    }

    #[test]
    fn name_with_type() {
        let t = TableConfig::new("events", TableType::Realtime);
        assert_eq!(t.table_name_with_type(), "events_REALTIME");

        let t = TableConfig::new("events_OFFLINE", TableType::Offline);
        assert_eq!(t.table_name_with_type(), "events_OFFLINE");
    }

    #[test]
    fn parse_json_table_config() {
        let json = r#"{
            "tableName": "clicks",
            "tableType": "OFFLINE",
            "task": {
                "taskTypeConfigsMap": {
                    "merge": { "bucketTimePeriod": "1d" },
                    "purge": {}
                }
            }
        }"#;
        let t = TableConfig::from_json(json).unwrap();
        assert_eq!(t.table_name, "clicks");
        assert_eq!(t.table_type, TableType::Offline);
        let tc = t.task_config().unwrap();
        assert!(tc.is_task_type_enabled("purge"));
        assert_eq!(tc.config_for("merge").unwrap()["bucketTimePeriod"], "1d");
        assert_eq!(tc.enabled_task_types().collect::<Vec<_>>(), vec!["merge", "purge"]);
    }

    #[test]
    fn parse_toml_table_config() {
        let toml = r#"
tableName = "views"
tableType = "REALTIME"

[task.taskTypeConfigsMap.merge]
maxNumRecordsPerSegment = "5000000"
"#;
        let t = TableConfig::from_toml(toml).unwrap();
        assert_eq!(t.table_type, TableType::Realtime);
        assert!(t.is_task_type_enabled("merge"));
    }

    #[test]
    fn missing_task_section_parses_as_none() {
        let t = TableConfig::from_json(r#"{"tableName":"t","tableType":"OFFLINE"}"#).unwrap();
        assert!(t.task_config().is_none());
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = TableConfig::from_json(r#"{"tableName":" ","tableType":"OFFLINE"}"#).unwrap_err();
        assert!(matches!(err, CairnError::InvalidTableConfig(_)));
    }

    #[test]
    fn parse_picks_format_by_extension() {
        let t = TableConfig::parse("tableName = \"views\"\ntableType = \"OFFLINE\"\n", "toml").unwrap();
        assert_eq!(t.table_name, "views");
        assert!(matches!(
            TableConfig::parse("{}", "yaml"),
            Err(CairnError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
    }
}
