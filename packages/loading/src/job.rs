//! Single active fetch job with supersession.
//!
//! Both loading machines allow at most one fetch in flight. Starting a new job
//! cancels the previous one first; cancelling the slot stops whatever runs.
//! Cancellation is cooperative: a job observes its token at its own await
//! points, so a late result may still be produced. Jobs drop such results by
//! checking the token before dispatching, and the reducers ignore anything
//! that slips through.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct ActiveJob {
    id: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveJob {
    fn cancel(self, reason: &'static str) {
        if !self.handle.is_finished() {
            debug!(job_id = self.id, reason, "cancelling fetch job");
        }
        self.token.cancel();
    }
}

/// Holds the handle of the one job allowed to run.
#[derive(Default)]
pub(crate) struct JobSlot {
    active: Mutex<Option<ActiveJob>>,
    next_id: AtomicU64,
}

impl JobSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cancel the running job, if any, and spawn a new one.
    ///
    /// `make` receives the new job's cancellation token.
    pub(crate) async fn replace<F, Fut>(&self, make: F) -> u64
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.cancel("superseded");
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let handle = tokio::spawn(make(token.clone()));
        debug!(job_id = id, "fetch job started");

        *active = Some(ActiveJob { id, token, handle });
        id
    }

    /// Cancel the running job without starting another.
    pub(crate) async fn cancel(&self) {
        if let Some(previous) = self.active.lock().await.take() {
            previous.cancel("cancelled");
        }
    }

    /// True while a job is registered and has not finished.
    pub(crate) async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|job| !job.handle.is_finished() && !job.token.is_cancelled())
            .unwrap_or(false)
    }
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        if let Some(job) = self.active.get_mut().take() {
            job.token.cancel();
        }
    }
}
