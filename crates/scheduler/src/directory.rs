//! [`TableDirectory`] implementations: a directory of config files for the
//! controller binary and an in-memory one for embedding and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use cairn_core::{CairnError, TableConfig};

use crate::cluster::TableDirectory;

const CONFIG_EXTENSIONS: &[&str] = &["json", "toml"];

/// Reads table configs from `<dir>/<table>.json` or `<dir>/<table>.toml`.
///
/// The file stem is the table name used for listing and lookup. Files are
/// re-read on every call, so edits show up on the next scheduling pass.
#[derive(Debug, Clone)]
pub struct FileTableDirectory {
    dir: PathBuf,
}

impl FileTableDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_config_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CONFIG_EXTENSIONS.contains(&e))
    }
}

#[async_trait]
impl TableDirectory for FileTableDirectory {
    async fn list_all_table_names(&self) -> Result<Vec<String>, CairnError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !Self::is_config_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn get_table_config(&self, table_name: &str) -> Result<Option<TableConfig>, CairnError> {
        for ext in CONFIG_EXTENSIONS {
            let path = self.dir.join(format!("{table_name}.{ext}"));
            if !tokio::fs::try_exists(&path).await? {
                continue;
            }
            debug!(table = table_name, path = %path.display(), "Loading table config");
            let content = tokio::fs::read_to_string(&path).await?;
            return TableConfig::parse(&content, ext).map(Some);
        }
        Ok(None)
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Present(TableConfig),
    /// Listed, but the config fetch comes back empty.
    Missing,
    /// Listed, but the config fetch fails.
    Broken(String),
}

/// Table directory held in memory, preserving insertion order.
#[derive(Debug, Default)]
pub struct InMemoryTableDirectory {
    entries: RwLock<Vec<(String, Entry)>>,
}

impl InMemoryTableDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    async fn upsert(&self, name: String, entry: Entry) {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = entry,
            None => entries.push((name, entry)),
        }
    }

    /// Add or replace a table keyed by its `table_name`.
    pub async fn insert(&self, config: TableConfig) {
        self.upsert(config.table_name.clone(), Entry::Present(config)).await;
    }

    /// List a table whose config cannot be found.
    pub async fn insert_missing(&self, table_name: &str) {
        self.upsert(table_name.to_string(), Entry::Missing).await;
    }

    /// List a table whose config fetch errors out.
    pub async fn insert_broken(&self, table_name: &str, reason: &str) {
        self.upsert(table_name.to_string(), Entry::Broken(reason.to_string())).await;
    }

    pub async fn remove(&self, table_name: &str) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(n, _)| n != table_name);
        entries.len() != before
    }
}

#[async_trait]
impl TableDirectory for InMemoryTableDirectory {
    async fn list_all_table_names(&self) -> Result<Vec<String>, CairnError> {
        Ok(self.entries.read().await.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn get_table_config(&self, table_name: &str) -> Result<Option<TableConfig>, CairnError> {
        let entries = self.entries.read().await;
        match entries.iter().find(|(n, _)| n == table_name).map(|(_, e)| e) {
            Some(Entry::Present(config)) => Ok(Some(config.clone())),
            Some(Entry::Broken(reason)) => Err(CairnError::Other(reason.clone())),
            Some(Entry::Missing) | None => Ok(None),
        }
    }
}
