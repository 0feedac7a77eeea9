//! Catalog of task generators keyed by job type.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};

use crate::error::SchedulerError;
use crate::generator::TaskGenerator;

/// What happens when a generator is registered under a job type that
/// already has one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationPolicy {
    /// Last registration wins; the replacement is logged as a warning.
    #[default]
    Overwrite,
    /// Keep the existing generator and return [`SchedulerError::DuplicateJobType`].
    Reject,
}

/// Registered generators behind a single-writer/many-reader lock.
#[derive(Default)]
pub struct TaskGeneratorRegistry {
    generators: RwLock<HashMap<String, Arc<dyn TaskGenerator>>>,
    policy: RegistrationPolicy,
}

impl TaskGeneratorRegistry {
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            generators: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    // A panicking writer leaves the map intact, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn TaskGenerator>>> {
        self.generators.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn TaskGenerator>>> {
        self.generators.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a generator under its job type.
    ///
    /// Returns the generator it replaced, if any.
    pub fn register(
        &self,
        generator: Arc<dyn TaskGenerator>,
    ) -> Result<Option<Arc<dyn TaskGenerator>>, SchedulerError> {
        let job_type = generator.job_type().to_string();
        let mut generators = self.write();

        if generators.contains_key(&job_type) {
            match self.policy {
                RegistrationPolicy::Reject => {
                    warn!(job_type = %job_type, "Rejected duplicate task generator registration");
                    return Err(SchedulerError::DuplicateJobType(job_type));
                }
                RegistrationPolicy::Overwrite => {
                    warn!(job_type = %job_type, "Replacing previously registered task generator");
                }
            }
        } else {
            info!(
                job_type = %job_type,
                max_concurrent = generator.max_concurrent_tasks_per_instance(),
                "Registered task generator"
            );
        }

        Ok(generators.insert(job_type, generator))
    }

    pub fn unregister(&self, job_type: &str) -> Option<Arc<dyn TaskGenerator>> {
        let removed = self.write().remove(job_type);
        if removed.is_some() {
            info!(job_type, "Unregistered task generator");
        }
        removed
    }

    /// Job types registered at the time of the call.
    pub fn all_task_types(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    pub fn get(&self, job_type: &str) -> Result<Arc<dyn TaskGenerator>, SchedulerError> {
        self.read()
            .get(job_type)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJobType(job_type.to_string()))
    }

    /// Consistent view of every (job type, generator) pair, sorted by job type.
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn TaskGenerator>)> {
        let mut entries: Vec<_> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneratorError;
    use async_trait::async_trait;
    use cairn_core::{JobSpec, TableConfig};

    struct NamedGenerator {
        job_type: String,
        concurrency: u32,
    }

    impl NamedGenerator {
        fn new(job_type: &str, concurrency: u32) -> Arc<Self> {
            Arc::new(Self {
                job_type: job_type.to_string(),
                concurrency,
            })
        }
    }

    #[async_trait]
    impl TaskGenerator for NamedGenerator {
        fn job_type(&self) -> &str {
            &self.job_type
        }

        fn max_concurrent_tasks_per_instance(&self) -> u32 {
            self.concurrency
        }

        async fn generate_tasks(&self, _tables: &[TableConfig]) -> Result<Vec<JobSpec>, GeneratorError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn register_and_get() {
        let registry = TaskGeneratorRegistry::default();
        assert!(registry.is_empty());

        registry.register(NamedGenerator::new("merge", 2)).unwrap();
        let g = registry.get("merge").unwrap();
        assert_eq!(g.job_type(), "merge");
        assert_eq!(g.max_concurrent_tasks_per_instance(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_job_type_is_not_found() {
        let registry = TaskGeneratorRegistry::default();
        match registry.get("purge") {
            Err(SchedulerError::UnknownJobType(t)) => assert_eq!(t, "purge"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected UnknownJobType"),
        }
    }

    #[test]
    fn overwrite_policy_keeps_last_registration() {
        let registry = TaskGeneratorRegistry::new(RegistrationPolicy::Overwrite);
        assert!(registry.register(NamedGenerator::new("merge", 1)).unwrap().is_none());

        let replaced = registry.register(NamedGenerator::new("merge", 7)).unwrap();
        assert_eq!(replaced.unwrap().max_concurrent_tasks_per_instance(), 1);
        assert_eq!(registry.get("merge").unwrap().max_concurrent_tasks_per_instance(), 7);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reject_policy_keeps_first_registration() {
        let registry = TaskGeneratorRegistry::new(RegistrationPolicy::Reject);
        registry.register(NamedGenerator::new("merge", 1)).unwrap();

        match registry.register(NamedGenerator::new("merge", 7)) {
            Err(SchedulerError::DuplicateJobType(t)) => assert_eq!(t, "merge"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected DuplicateJobType"),
        }
        assert_eq!(registry.get("merge").unwrap().max_concurrent_tasks_per_instance(), 1);
    }

    #[test]
    fn all_task_types_is_a_snapshot() {
        let registry = TaskGeneratorRegistry::default();
        registry.register(NamedGenerator::new("purge", 1)).unwrap();
        registry.register(NamedGenerator::new("merge", 1)).unwrap();

        let types = registry.all_task_types();
        registry.register(NamedGenerator::new("convert", 1)).unwrap();

        assert_eq!(types.into_iter().collect::<Vec<_>>(), vec!["merge", "purge"]);
        assert_eq!(registry.all_task_types().len(), 3);
    }

    #[test]
    fn snapshot_is_sorted_and_unregister_removes() {
        let registry = TaskGeneratorRegistry::default();
        registry.register(NamedGenerator::new("purge", 1)).unwrap();
        registry.register(NamedGenerator::new("merge", 1)).unwrap();

        let names: Vec<String> = registry.snapshot().into_iter().map(|(t, _)| t).collect();
        assert_eq!(names, vec!["merge", "purge"]);

        assert!(registry.unregister("merge").is_some());
        assert!(registry.unregister("merge").is_none());
        assert!(registry.get("merge").is_err());
    }
}
