//! Bounded job dispatch
//!
//! Uploads hand score ids to [`JobQueue::enqueue`], which never blocks. A
//! dispatcher task starts at most `max_concurrent` pipelines at a time, in
//! arrival order. Ids already queued or running are not enqueued twice.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use super::runner::ScoreProcessor;

type ActiveSet = Arc<Mutex<HashSet<i64>>>;

/// Handle for submitting scores to the pipeline
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<i64>,
    active: ActiveSet,
}

impl JobQueue {
    /// Spawn the dispatcher on the current tokio runtime
    pub fn start(processor: ScoreProcessor, max_concurrent: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let active: ActiveSet = Arc::new(Mutex::new(HashSet::new()));
        let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));

        tokio::spawn(dispatch(receiver, processor, permits, Arc::clone(&active)));
        info!(max_concurrent, "Job queue started");

        Self { sender, active }
    }

    /// Submit a score. Returns false if it is already queued or running.
    pub fn enqueue(&self, score_id: i64) -> bool {
        if !lock(&self.active).insert(score_id) {
            warn!(score_id, "Score already queued or running, not enqueued again");
            return false;
        }

        if self.sender.send(score_id).is_err() {
            lock(&self.active).remove(&score_id);
            error!(score_id, "Job dispatcher is gone, score not enqueued");
            return false;
        }

        debug!(score_id, "Score enqueued");
        true
    }

    /// True while the score is queued or its pipeline is running
    pub fn is_active(&self, score_id: i64) -> bool {
        lock(&self.active).contains(&score_id)
    }

    /// Number of scores queued or running
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

fn lock(active: &Mutex<HashSet<i64>>) -> MutexGuard<'_, HashSet<i64>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes the id from the active set when the job ends, panics included
struct ActiveGuard {
    score_id: i64,
    active: ActiveSet,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.score_id);
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<i64>,
    processor: ScoreProcessor,
    permits: Arc<Semaphore>,
    active: ActiveSet,
) {
    while let Some(score_id) = receiver.recv().await {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let processor = processor.clone();
        let guard = ActiveGuard {
            score_id,
            active: Arc::clone(&active),
        };

        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;

            match processor.process(score_id).await {
                Ok(Some(status)) => info!(score_id, status = %status, "Pipeline finished"),
                Ok(None) => debug!(score_id, "Pipeline skipped, score deleted"),
                // Nothing to report to: the upload request has long returned
                Err(e) => error!(score_id, error = %e, "Failed to process score"),
            }
        });
    }

    debug!("Job dispatcher stopped");
}
