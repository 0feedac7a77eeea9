pub mod admin;
pub mod cluster;
pub mod directory;
pub mod error;
pub mod generator;
pub mod generators;
pub mod manager;
pub mod metrics;
pub mod periodic;
pub mod registry;

pub use cluster::{ClusterInfo, LeadershipOracle, StaticLeadership, TableDirectory};
pub use directory::{FileTableDirectory, InMemoryTableDirectory};
pub use error::{GeneratorError, SchedulerError};
pub use generator::TaskGenerator;
pub use generators::{GeneratorSpec, GeneratorsFile, PerTableTaskGenerator};
pub use manager::{ScheduleReport, TaskManager, TypeFailure};
pub use metrics::{InMemoryMetrics, MetricsSink, MetricsSnapshot};
pub use periodic::{PeriodicTask, PeriodicTaskRunner};
pub use registry::{RegistrationPolicy, TaskGeneratorRegistry};
