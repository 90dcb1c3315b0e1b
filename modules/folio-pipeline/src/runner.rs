// Worker-pool harness. Pulls deliveries from the queue's priority lanes,
// weighted 6:3:1 toward the critical lane, and dispatches each to its
// stage handler under the task kind's timeout. Handler errors and timeouts
// go back to the queue for backoff/retry; everything else is acked.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use folio_common::FolioError;

use crate::queue::{Delivery, QueueDriver};
use crate::stages::{ClassifyStage, FetchStage, MediaStage};
use crate::tasks::{Lane, PipelineTask};

/// How long an idle worker waits before re-checking the lanes.
const IDLE_POLL: Duration = Duration::from_millis(100);

pub struct PipelineRunner {
    queue: Arc<dyn QueueDriver>,
    fetch: FetchStage,
    classify: ClassifyStage,
    media: Option<MediaStage>,
    concurrency: usize,
}

impl PipelineRunner {
    /// `media` is None when image rehosting is not configured; media tasks
    /// are then dropped on the floor (they are best-effort by contract).
    pub fn new(
        queue: Arc<dyn QueueDriver>,
        fetch: FetchStage,
        classify: ClassifyStage,
        media: Option<MediaStage>,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            fetch,
            classify,
            media,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the worker pool until `shutdown` flips to true. Workers finish
    /// their in-flight task before exiting.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(workers = self.concurrency, "Pipeline runner starting");

        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let runner = Arc::clone(&self);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(runner.worker(worker_id, shutdown)));
        }
        for handle in handles {
            let _ = handle.await;
        }

        info!("Pipeline runner stopped");
    }

    async fn worker(self: Arc<Self>, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        // Stagger the weighting phase so workers don't move in lockstep.
        let mut tick = worker_id as u64;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut delivery = None;
            for lane in lane_preference(tick) {
                if let Some(d) = self.queue.reserve(lane).await {
                    delivery = Some(d);
                    break;
                }
            }
            tick = tick.wrapping_add(1);

            match delivery {
                Some(delivery) => self.dispatch(delivery).await,
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        debug!(worker_id, "Worker stopped");
    }

    async fn dispatch(&self, delivery: Delivery) {
        let kind = delivery.task.kind();
        let deadline = delivery.task.timeout();

        let outcome = tokio::time::timeout(deadline, self.handle(&delivery.task)).await;
        match outcome {
            Ok(Ok(())) => self.queue.ack(delivery).await,
            Ok(Err(err)) => {
                warn!(
                    kind,
                    attempt = delivery.attempt,
                    error = %err,
                    "Stage failed, handing back for retry"
                );
                self.queue.retry(delivery).await;
            }
            Err(_elapsed) => {
                warn!(
                    kind,
                    attempt = delivery.attempt,
                    timeout_secs = deadline.as_secs(),
                    "Stage timed out, handing back for retry"
                );
                self.queue.retry(delivery).await;
            }
        }
    }

    async fn handle(&self, task: &PipelineTask) -> Result<(), FolioError> {
        match task {
            PipelineTask::Fetch(payload) => self.fetch.process(payload).await,
            PipelineTask::Classify(payload) => self.classify.process(payload).await,
            PipelineTask::Media(payload) => match &self.media {
                Some(stage) => stage.process(payload).await,
                None => {
                    debug!(
                        article_id = %payload.article_id,
                        "Image rehosting disabled, dropping media task"
                    );
                    Ok(())
                }
            },
        }
    }
}

/// Lane order for one scheduling tick: six of every ten ticks prefer the
/// critical lane, three the default lane, one the low lane. Lower lanes
/// are always visited as fallback so no worker idles while work waits.
fn lane_preference(tick: u64) -> [Lane; 3] {
    match tick % 10 {
        0..=5 => [Lane::Critical, Lane::Default, Lane::Low],
        6..=8 => [Lane::Default, Lane::Critical, Lane::Low],
        _ => [Lane::Low, Lane::Critical, Lane::Default],
    }
}
