//! Core job types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a job produced no result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The job body returned an error.
    #[error("job failed: {0}")]
    Failed(String),
    /// The job body panicked.
    #[error("job panicked: {0}")]
    Panicked(String),
    /// The worker went away without reporting (queue torn down).
    #[error("job result lost: worker exited before reporting")]
    Lost,
    /// The queue no longer accepts work.
    #[error("job queue is closed")]
    Closed,
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

/// How a job body ended, as reported to the worker running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobReport {
    Succeeded,
    Failed,
    Panicked,
}

/// What a finished job body hands back to its worker.
///
/// `deliver` sends the typed result to the handle. Workers call it only after
/// booking `report`, so a joined handle never sees stale stats.
pub struct JobCompletion {
    pub report: JobReport,
    pub deliver: Box<dyn FnOnce() + Send + 'static>,
}

impl std::fmt::Debug for JobCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCompletion")
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

/// Work item as the queue sees it: type-erased body plus routing metadata.
pub struct QueuedJob {
    pub id: JobId,
    pub queue: String,
    pub run: Box<dyn FnOnce() -> JobCompletion + Send + 'static>,
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Result of one joined job.
#[derive(Debug)]
pub struct JobOutcome<T> {
    pub id: JobId,
    pub queue: String,
    pub result: Result<T, JobError>,
    pub elapsed: Duration,
}

/// Local job queue configuration.
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Worker thread count
    pub workers: usize,
    /// Name prefix for worker threads and logs
    pub name: String,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            name: "job-queue".to_string(),
        }
    }
}

impl JobQueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}
