// In-process queue driver: per-lane FIFOs with exponential-backoff
// redelivery. Durability is the production broker's concern — this driver
// exists so the pipeline runs whole in one process (dev, tests) behind the
// same traits.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use folio_common::FolioError;

use super::{Delivery, QueueDriver, TaskQueue};
use crate::tasks::{Lane, PipelineTask};

#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
    backoff_base: Duration,
}

struct Inner {
    lanes: Mutex<HashMap<Lane, VecDeque<Delivery>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::with_backoff(Duration::from_secs(1))
    }

    /// Tests shrink the backoff base so redeliveries land quickly.
    pub fn with_backoff(backoff_base: Duration) -> Self {
        let mut lanes = HashMap::new();
        for lane in Lane::ALL {
            lanes.insert(lane, VecDeque::new());
        }
        Self {
            inner: Arc::new(Inner {
                lanes: Mutex::new(lanes),
            }),
            backoff_base,
        }
    }

    /// Total tasks currently waiting across all lanes.
    pub fn depth(&self) -> usize {
        let lanes = self.inner.lanes.lock().unwrap();
        lanes.values().map(|q| q.len()).sum()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn push(&self, delivery: Delivery) {
        let lane = delivery.task.lane();
        let mut lanes = self.lanes.lock().unwrap();
        lanes.entry(lane).or_default().push_back(delivery);
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: PipelineTask) -> Result<(), FolioError> {
        debug!(kind = task.kind(), lane = task.lane().as_str(), "Enqueueing task");
        self.inner.push(Delivery { task, attempt: 0 });
        Ok(())
    }
}

#[async_trait]
impl QueueDriver for MemoryQueue {
    async fn reserve(&self, lane: Lane) -> Option<Delivery> {
        let mut lanes = self.inner.lanes.lock().unwrap();
        lanes.get_mut(&lane).and_then(|q| q.pop_front())
    }

    async fn ack(&self, _delivery: Delivery) {
        // Reserve already removed it; nothing to do in-process.
    }

    async fn retry(&self, delivery: Delivery) {
        let attempt = delivery.attempt + 1;
        if attempt > delivery.task.max_retries() {
            warn!(
                kind = delivery.task.kind(),
                attempt,
                "Retry budget exhausted, dropping task"
            );
            return;
        }

        // Exponential backoff, capped at base * 2^6.
        let delay = self.backoff_base * 2u32.pow((attempt - 1).min(6));
        let inner = Arc::clone(&self.inner);
        let redelivery = Delivery {
            task: delivery.task,
            attempt,
        };
        debug!(
            kind = redelivery.task.kind(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling redelivery"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.push(redelivery);
        });
    }
}
