//! Local worker pool and typed job handles.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::types::{JobCompletion, JobError, JobId, JobOutcome, JobQueueConfig, JobReport, QueuedJob};

type ResultChannel<T> = mpsc::Sender<(Result<T, JobError>, Duration)>;

/// Asynchronous job submission.
pub trait JobQueue: Send + Sync {
    /// Hand a type-erased job to the workers.
    fn enqueue(&self, job: QueuedJob) -> Result<(), JobError>;

    /// Submit a job body tagged with `queue` and get a typed handle to its result.
    fn submit<T, E, F>(&self, queue: &str, job: F) -> Result<JobHandle<T>, JobError>
    where
        Self: Sized,
        T: Send + 'static,
        E: Display + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let id = JobId::new();
        let (tx, rx) = mpsc::channel();
        self.enqueue(QueuedJob {
            id,
            queue: queue.to_string(),
            run: package(job, tx),
        })?;
        Ok(JobHandle {
            id,
            queue: queue.to_string(),
            rx,
        })
    }
}

impl<Q> JobQueue for Arc<Q>
where
    Q: JobQueue + ?Sized,
{
    fn enqueue(&self, job: QueuedJob) -> Result<(), JobError> {
        (**self).enqueue(job)
    }
}

fn package<T, E, F>(job: F, tx: ResultChannel<T>) -> Box<dyn FnOnce() -> JobCompletion + Send + 'static>
where
    T: Send + 'static,
    E: Display + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    Box::new(move || {
        let started = Instant::now();
        let (result, report) = match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(value)) => (Ok(value), JobReport::Succeeded),
            Ok(Err(e)) => (Err(JobError::Failed(e.to_string())), JobReport::Failed),
            Err(payload) => (
                Err(JobError::Panicked(panic_message(payload.as_ref()))),
                JobReport::Panicked,
            ),
        };
        let elapsed = started.elapsed();
        JobCompletion {
            report,
            deliver: Box::new(move || {
                // The caller may have dropped its handle; the job still counts as run.
                let _ = tx.send((result, elapsed));
            }),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Typed handle to a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: JobId,
    queue: String,
    rx: mpsc::Receiver<(Result<T, JobError>, Duration)>,
}

impl<T> JobHandle<T> {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Block until the job reports.
    pub fn join(self) -> JobOutcome<T> {
        let (result, elapsed) = self
            .rx
            .recv()
            .unwrap_or((Err(JobError::Lost), Duration::ZERO));
        JobOutcome {
            id: self.id,
            queue: self.queue,
            result,
            elapsed,
        }
    }
}

/// Wait for every handle, in the order given, regardless of individual failures.
pub fn join_all<T>(handles: impl IntoIterator<Item = JobHandle<T>>) -> Vec<JobOutcome<T>> {
    handles.into_iter().map(JobHandle::join).collect()
}

/// Queue runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub jobs_submitted: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_panicked: u64,
    pub current_running: usize,
}

/// In-process worker pool.
///
/// Every queue name is served by the same workers; the name tags logs and
/// handles. Dropping the queue stops intake and waits for queued jobs to finish.
#[derive(Debug)]
pub struct LocalJobQueue {
    name: String,
    sender: Option<mpsc::Sender<QueuedJob>>,
    workers: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<QueueStats>>,
}

impl LocalJobQueue {
    pub fn start(config: JobQueueConfig) -> Result<Self, JobError> {
        let (tx, rx) = mpsc::channel::<QueuedJob>();
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(Mutex::new(QueueStats::default()));

        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers.max(1) {
            let worker_name = format!("{}-{i}", config.name);
            let rx = rx.clone();
            let stats = stats.clone();
            let handle = thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || worker_loop(&worker_name, &rx, &stats))
                .map_err(|e| JobError::Spawn(e.to_string()))?;
            workers.push(handle);
        }

        info!(queue = %config.name, workers = workers.len(), "job queue started");

        Ok(Self {
            name: config.name,
            sender: Some(tx),
            workers,
            stats,
        })
    }

    /// Get current queue statistics.
    pub fn stats(&self) -> QueueStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Stop accepting jobs and wait for the queued ones to finish.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl JobQueue for LocalJobQueue {
    fn enqueue(&self, job: QueuedJob) -> Result<(), JobError> {
        let sender = self.sender.as_ref().ok_or(JobError::Closed)?;
        debug!(queue = %job.queue, job_id = %job.id, "job submitted");
        record(&self.stats, |s| s.jobs_submitted += 1);
        sender.send(job).map_err(|_| JobError::Closed)
    }
}

impl Drop for LocalJobQueue {
    fn drop(&mut self) {
        // Closing the channel lets workers drain what is queued, then exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!(queue = %self.name, "job queue stopped");
    }
}

fn worker_loop(name: &str, rx: &Mutex<mpsc::Receiver<QueuedJob>>, stats: &Mutex<QueueStats>) {
    debug!(worker = name, "job worker started");

    loop {
        let next = match rx.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        let Ok(job) = next else {
            break;
        };

        record(stats, |s| s.current_running += 1);
        let QueuedJob { id, queue, run } = job;
        let JobCompletion { report, deliver } = run();

        record(stats, |s| {
            s.current_running = s.current_running.saturating_sub(1);
            match report {
                JobReport::Succeeded => s.jobs_succeeded += 1,
                JobReport::Failed => s.jobs_failed += 1,
                JobReport::Panicked => s.jobs_panicked += 1,
            }
        });
        deliver();

        match report {
            JobReport::Succeeded => debug!(worker = name, job_id = %id, queue = %queue, "job completed"),
            JobReport::Failed => warn!(worker = name, job_id = %id, queue = %queue, "job failed"),
            JobReport::Panicked => warn!(worker = name, job_id = %id, queue = %queue, "job panicked"),
        }
    }

    debug!(worker = name, "job worker stopped");
}

fn record(stats: &Mutex<QueueStats>, f: impl FnOnce(&mut QueueStats)) {
    if let Ok(mut s) = stats.lock() {
        f(&mut s);
    }
}
