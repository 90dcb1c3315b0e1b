// Stage handlers. Each consumes one task kind, performs one unit of
// pipeline work against its external collaborator, and enqueues the next
// stage (or terminates).
//
// Error contract with the runner: a returned `Err` is retryable and hands
// the delivery back to the queue. Permanent failures (the collaborator
// looked at the content and said no) are absorbed — the handler records
// `failed` on the CrawlTask and acks, so the queue doesn't retry a
// hopeless task.

pub mod classify;
pub mod fetch;
pub mod media;

pub use classify::ClassifyStage;
pub use fetch::FetchStage;
pub use media::MediaStage;
