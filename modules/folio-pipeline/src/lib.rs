// The submission pipeline: quota gate → submission → fetch → classify →
// media rehosting, driven by a worker pool over a three-lane task queue.
//
// Layout mirrors the boundaries in the design:
// - `quota` / `submit` — the synchronous entry path (API-facing)
// - `stages` — the three queue-task handlers
// - `runner` — worker pool, lane weighting, per-kind timeouts
// - `queue` — producer/consumer traits plus the in-process driver
// - `store` — Postgres implementations of the store traits
// - `traits` — seams between all of the above, mocked in `testing`

pub mod images;
pub mod queue;
pub mod quota;
pub mod runner;
pub mod stages;
pub mod store;
pub mod submit;
pub mod tasks;
pub mod testing;
pub mod traits;

pub use quota::{QuotaDecision, QuotaGate};
pub use runner::PipelineRunner;
pub use submit::{SubmissionService, SubmitReceipt, SubmitRequest};
pub use tasks::{Lane, PipelineTask};
