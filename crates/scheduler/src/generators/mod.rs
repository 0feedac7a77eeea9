//! Built-in task generators and the file that declares which ones to run.

mod per_table;

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use cairn_core::CairnError;

use crate::cluster::ClusterInfo;
use crate::generator::TaskGenerator;

pub use self::per_table::PerTableTaskGenerator;

/// One `[[generator]]` entry of the generators file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GeneratorSpec {
    pub job_type: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_per_instance: u32,
    /// Emit nothing while an earlier batch of this type is still queued or running.
    #[serde(default)]
    pub skip_when_in_flight: bool,
}

fn default_max_concurrent() -> u32 {
    1
}

/// Generators declared in TOML:
///
/// ```toml
/// [[generator]]
/// job_type = "MergeRollupTask"
/// max_concurrent_per_instance = 2
/// skip_when_in_flight = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratorsFile {
    #[serde(default)]
    pub generator: Vec<GeneratorSpec>,
}

impl GeneratorsFile {
    pub fn from_toml(s: &str) -> Result<Self, CairnError> {
        let file: Self = toml::from_str(s)?;
        if let Some(bad) = file.generator.iter().find(|g| g.job_type.trim().is_empty()) {
            return Err(CairnError::Other(format!(
                "generator entry with empty job_type (max_concurrent_per_instance = {})",
                bad.max_concurrent_per_instance
            )));
        }
        Ok(file)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CairnError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Instantiate every declared generator, in file order.
    pub fn build(&self, cluster_info: &ClusterInfo) -> Vec<Arc<dyn TaskGenerator>> {
        self.generator
            .iter()
            .map(|spec| {
                let generator = PerTableTaskGenerator::new(&spec.job_type)
                    .with_max_concurrent(spec.max_concurrent_per_instance);
                let generator = if spec.skip_when_in_flight {
                    generator.skip_when_in_flight(cluster_info.clone())
                } else {
                    generator
                };
                Arc::new(generator) as Arc<dyn TaskGenerator>
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generators_with_defaults() {
        let file = GeneratorsFile::from_toml(
            r#"
            [[generator]]
            job_type = "merge"
            max_concurrent_per_instance = 3
            skip_when_in_flight = true

            [[generator]]
            job_type = "purge"
            "#,
        )
        .unwrap();

        assert_eq!(file.generator.len(), 2);
        assert_eq!(file.generator[0].max_concurrent_per_instance, 3);
        assert!(file.generator[0].skip_when_in_flight);
        assert_eq!(
            file.generator[1],
            GeneratorSpec {
                job_type: "purge".into(),
                max_concurrent_per_instance: 1,
                skip_when_in_flight: false,
            }
        );
    }

    #[test]
    fn empty_file_declares_nothing() {
        assert!(GeneratorsFile::from_toml("").unwrap().generator.is_empty());
    }

    #[test]
    fn rejects_blank_job_type() {
        assert!(GeneratorsFile::from_toml("[[generator]]\njob_type = \" \"\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generators.toml");
        std::fs::write(&path, "[[generator]]\njob_type = \"convert\"\n").unwrap();
        let file = GeneratorsFile::from_file(&path).unwrap();
        assert_eq!(file.generator[0].job_type, "convert");
    }
}
