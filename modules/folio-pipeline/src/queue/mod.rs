// Queue boundary. The broker itself is infrastructure: the pipeline only
// schedules work onto it (TaskQueue) and drains deliveries from it
// (QueueDriver). `memory::MemoryQueue` is the in-process driver used for
// local development and tests; a Redis- or SQS-backed driver implements
// the same traits in production.

pub mod memory;

pub use memory::MemoryQueue;

use async_trait::async_trait;

use folio_common::FolioError;

use crate::tasks::{Lane, PipelineTask};

/// One handed-out unit of work. `attempt` counts prior failed deliveries
/// of the same task.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub task: PipelineTask,
    pub attempt: u32,
}

/// Producer side: schedule a task onto its lane.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: PipelineTask) -> Result<(), FolioError>;
}

/// Consumer side, used only by the pipeline runner.
#[async_trait]
pub trait QueueDriver: TaskQueue {
    /// Take the next due delivery from one lane, if any.
    async fn reserve(&self, lane: Lane) -> Option<Delivery>;

    /// The delivery was processed; drop it.
    async fn ack(&self, delivery: Delivery);

    /// The delivery failed with a retryable error. The queue redelivers
    /// with backoff until the task kind's budget is spent, then drops it.
    async fn retry(&self, delivery: Delivery);
}
