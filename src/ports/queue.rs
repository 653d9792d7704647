use crate::domain::jobs::{JobStatus, QueueJob};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait JobQueuePort: Send + Sync {
    /// Persist a new `queued` job
    async fn enqueue_job(&self, job: &QueueJob) -> Result<()>;

    /// Take the oldest `queued` job and mark it `processing`.
    /// Returns `None` when nothing is queued.
    async fn claim_next(&self) -> Result<Option<QueueJob>>;

    /// Move a job forward; backward transitions are refused
    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<QueueJob>;

    async fn get_job(&self, id: Uuid) -> Result<Option<QueueJob>>;
}
