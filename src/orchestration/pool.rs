//! Bounded worker pool for independent units of work.
//!
//! The `WorkerPool` runs a batch of jobs with at most `max_concurrent` in
//! flight. Every job is submitted up front; a semaphore decides which run.
//! Status changes are emitted as events on a channel so a caller can report
//! progress without polling.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::error;

use crate::core::UnitOutcome;

/// Events emitted by the pool for job status changes.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A job acquired a slot and started running.
    Started {
        /// Position of the job in the submitted batch.
        job: usize,
    },
    /// A job reached a terminal outcome.
    Finished {
        /// Position of the job in the submitted batch.
        job: usize,
        /// How the job ended.
        outcome: UnitOutcome,
    },
}

/// Runs jobs concurrently with a fixed capacity.
///
/// # Example
///
/// ```ignore
/// use sqa_pipeline::orchestration::WorkerPool;
///
/// let pool = WorkerPool::new(4);
/// let outcomes = pool.run(tasks, |task| async move { score(task).await }).await;
/// ```
#[derive(Debug, Clone)]
pub struct WorkerPool {
    /// Maximum number of jobs running at once.
    max_concurrent: usize,
    /// Channel for emitting job events.
    event_tx: Option<mpsc::UnboundedSender<WorkerEvent>>,
}

impl WorkerPool {
    /// Create a pool with the given capacity (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            event_tx: None,
        }
    }

    /// Emit job events on `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Get the maximum concurrent jobs allowed.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run every job and return their outcomes in submission order.
    ///
    /// A job that panics is reported as failed; the other jobs keep running.
    pub async fn run<J, F, Fut>(&self, jobs: Vec<J>, work: F) -> Vec<UnitOutcome>
    where
        J: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UnitOutcome> + Send + 'static,
    {
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let work = Arc::new(work);
        let mut set = JoinSet::new();

        for (job, input) in jobs.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let work = work.clone();
            let events = self.event_tx.clone();
            set.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                emit(&events, WorkerEvent::Started { job });
                let outcome = work(input).await;
                emit(
                    &events,
                    WorkerEvent::Finished {
                        job,
                        outcome: outcome.clone(),
                    },
                );
                (job, outcome)
            });
        }

        let mut outcomes: Vec<Option<UnitOutcome>> = vec![None; total];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((job, outcome)) => outcomes[job] = Some(outcome),
                Err(e) => error!("Worker task aborted: {}", e),
            }
        }

        outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| UnitOutcome::failed("worker panicked")))
            .collect()
    }
}

fn emit(events: &Option<mpsc::UnboundedSender<WorkerEvent>>, event: WorkerEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
