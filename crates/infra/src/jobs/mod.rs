//! Background job queue.
//!
//! ## Design
//!
//! - Jobs are closures tagged with a queue name and run on named worker threads
//! - Each job reports through its own typed channel; there is no shared results map
//! - `join_all` is a full barrier: it waits for every handle, successes and failures alike
//! - Submitted jobs cannot be cancelled; dropping the queue drains them first
//!
//! ## Components
//!
//! - `JobQueue`: submission seam (object-safe core + typed `submit`)
//! - `LocalJobQueue`: in-process worker pool
//! - `JobHandle`: typed handle to one job's result

pub mod queue;
pub mod types;

pub use queue::{JobHandle, JobQueue, LocalJobQueue, QueueStats, join_all};
pub use types::{JobCompletion, JobError, JobId, JobOutcome, JobQueueConfig, JobReport, QueuedJob};
