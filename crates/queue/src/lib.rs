pub mod error;
pub mod gateway;
pub mod memory;
pub mod sqs;

pub use error::QueueError;
pub use gateway::{TaskQueueGateway, TaskState};
pub use memory::{InMemoryTaskQueue, SubmittedBatch};
pub use sqs::SqsTaskQueue;
