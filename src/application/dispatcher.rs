//! Bounded, cancellable execution of interactive merges.

use super::orchestrator::{MergeOrchestrator, MergeOutcome};
use crate::domain::units::NarrationUnit;
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A merge running in the background.
#[derive(Debug)]
pub struct MergeHandle {
    pub unit_id: String,
    cancel: CancellationToken,
    task: JoinHandle<Result<MergeOutcome>>,
}

impl MergeHandle {
    /// Stop the merge; the unit ends `failed`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<MergeOutcome> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

/// Runs at most `max_concurrent` merges at once; the rest wait for a permit.
pub struct MergeDispatcher {
    orchestrator: Arc<MergeOrchestrator>,
    permits: Arc<Semaphore>,
    capacity: usize,
    shutdown: CancellationToken,
}

impl MergeDispatcher {
    pub fn new(orchestrator: Arc<MergeOrchestrator>, max_concurrent: usize) -> Self {
        let capacity = max_concurrent.max(1);
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn dispatch(&self, unit: NarrationUnit) -> MergeHandle {
        let cancel = self.shutdown.child_token();
        let unit_id = unit.id.clone();
        let orchestrator = self.orchestrator.clone();
        let permits = self.permits.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                debug!(unit = %unit.id, "merge cancelled before it started");
                orchestrator.abandon(unit).await;
                return Err(Error::Cancelled);
            };
            orchestrator.merge_cancellable(unit, token).await
        });

        info!(unit = %unit_id, "merge dispatched");
        MergeHandle {
            unit_id,
            cancel,
            task,
        }
    }

    /// Merges currently holding a permit.
    pub fn running(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Cancel every dispatched merge, running or waiting.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
