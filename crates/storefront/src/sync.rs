//! Best-effort side channel for fire-and-forget remote writes.
//!
//! Jobs run one at a time, in submission order, on a background worker.
//! A failing job is logged and counted; nothing is ever reported back to the
//! submitter. Callers that need to observe completion (tests, CLI shutdown)
//! use [`BestEffort::flush`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type JobFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

enum Job {
    Task { label: &'static str, fut: JobFuture },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Stats {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Non-blocking task queue with a catch-and-log policy.
///
/// The worker is spawned on the current Tokio runtime the first time a job
/// is submitted. Outside a runtime, submitted jobs are dropped and counted as
/// failed.
pub struct BestEffort {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    stats: Arc<Stats>,
}

impl BestEffort {
    /// An idle queue; no worker runs until the first submission.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            stats: Arc::new(Stats::default()),
        }
    }

    /// Queue `fut` without waiting for it. Never blocks, never fails.
    pub fn submit<F, E>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        let fut: JobFuture = Box::pin(async move { fut.await.map_err(|e| e.to_string()) });
        if !self.send(Job::Task { label, fut }) {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(task = label, "no async runtime, dropping best-effort task");
        }
    }

    /// Resolve once every job submitted before this call has run.
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        let queued = {
            let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            sender
                .as_ref()
                .is_some_and(|sender| sender.send(Job::Flush(done)).is_ok())
        };
        if queued {
            let _ = finished.await;
        }
    }

    /// Jobs that finished successfully.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Jobs that failed or could not be run.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.stats.failed.load(Ordering::Relaxed)
    }

    // A worker whose runtime has shut down is replaced once.
    fn send(&self, job: Job) -> bool {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let job = match sender.as_ref() {
            Some(tx) => match tx.send(job) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(job)) => {
                    debug!("best-effort worker gone, starting a new one");
                    *sender = None;
                    job
                }
            },
            None => job,
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_worker(rx, Arc::clone(&self.stats)));
        let sent = tx.send(job).is_ok();
        *sender = Some(tx);
        sent
    }
}

impl Default for BestEffort {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BestEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestEffort")
            .field("completed", &self.completed())
            .field("failed", &self.failed())
            .finish_non_exhaustive()
    }
}

async fn run_worker(mut jobs: mpsc::UnboundedReceiver<Job>, stats: Arc<Stats>) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Task { label, fut } => match fut.await {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    debug!(task = label, "best-effort task completed");
                }
                Err(error) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(task = label, %error, "best-effort task failed");
                }
            },
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
