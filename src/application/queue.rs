//! Batched merge requests: fast validated submission, and a single consumer
//! that runs one job at a time.

use crate::config::PipelineSettings;
use crate::domain::chunks::{BookId, ChunkId, GroupKey};
use crate::domain::jobs::{JobStatus, QueueJob};
use crate::error::{Error, Result};
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::{ChunkRepository, DedupStore};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Submission {
    /// The group was merged before; nothing was queued
    AlreadyAvailable(PathBuf),
    Queued(QueueJob),
}

pub struct JobQueueService {
    queue: Arc<dyn JobQueuePort>,
    chunks: Arc<dyn ChunkRepository>,
    dedup: Arc<dyn DedupStore>,
    settings: PipelineSettings,
}

impl JobQueueService {
    pub fn new(
        queue: Arc<dyn JobQueuePort>,
        chunks: Arc<dyn ChunkRepository>,
        dedup: Arc<dyn DedupStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            queue,
            chunks,
            dedup,
            settings,
        }
    }

    /// Validate a request and queue it. Never waits on synthesis.
    pub async fn submit(&self, book_id: BookId, chunk_ids: Vec<ChunkId>) -> Result<Submission> {
        if chunk_ids.is_empty() || chunk_ids.len() > self.settings.max_queued_chunks {
            return Err(Error::validation(format!(
                "between 1 and {} chunk ids required, got {}",
                self.settings.max_queued_chunks,
                chunk_ids.len()
            )));
        }

        let mut chunks = self.chunks.get_chunks(&chunk_ids).await?;
        chunks.retain(|c| c.book_id == book_id);
        if chunks.len() != chunk_ids.len() {
            return Err(Error::validation(format!(
                "some chunks not found in book {}",
                book_id
            )));
        }
        chunks.sort_by_key(|c| c.index);

        let key = match (chunks.first(), chunks.last()) {
            (Some(first), Some(last)) => GroupKey::new(book_id, first.index, last.index),
            _ => return Err(Error::validation("empty chunk group")),
        };
        if let Some(group) = self.dedup.lookup_by_range(&key).await? {
            info!(group = %key, "group already merged");
            return Ok(Submission::AlreadyAvailable(group.audio_path));
        }

        let text_bytes: usize = chunks.iter().map(|c| c.content.len()).sum();
        if text_bytes > self.settings.max_queued_text_bytes {
            return Err(Error::validation(format!(
                "combined text is {} bytes, limit is {}",
                text_bytes, self.settings.max_queued_text_bytes
            )));
        }

        let job = QueueJob::new(book_id, chunk_ids);
        self.queue.enqueue_job(&job).await?;
        info!(job_id = %job.id, group = %key, "job queued");
        Ok(Submission::Queued(job))
    }

    pub async fn status(&self, id: Uuid) -> Result<QueueJob> {
        self.queue
            .get_job(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))
    }
}

/// Whatever turns a job's chunk set into a merged artifact.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupMerger: Send + Sync {
    async fn merge_group(&self, book_id: BookId, chunk_ids: &[ChunkId]) -> Result<PathBuf>;
}

/// The single queue consumer.
pub struct JobWorker {
    queue: Arc<dyn JobQueuePort>,
    merger: Arc<dyn GroupMerger>,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(
        queue: Arc<dyn JobQueuePort>,
        merger: Arc<dyn GroupMerger>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            merger,
            poll_interval,
        }
    }

    /// Poll until `shutdown` is cancelled. A running job is finished first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(poll = ?self.poll_interval, "job worker started");
        while !shutdown.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(error = %e, "queue error");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
        info!("job worker stopped");
    }

    /// Claim and run the oldest queued job, if any.
    pub async fn run_once(&self) -> Result<Option<QueueJob>> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(None);
        };
        info!(job_id = %job.id, book_id = job.book_id, chunks = ?job.chunk_ids, "job started");

        let next = match self.merger.merge_group(job.book_id, &job.chunk_ids).await {
            Ok(path) => {
                info!(job_id = %job.id, ?path, "job complete");
                JobStatus::Complete
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "job failed");
                JobStatus::Failed
            }
        };
        let job = self.queue.update_status(job.id, next).await?;
        Ok(Some(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::MemoryStore;
    use crate::domain::chunks::{Chunk, ProcessedChunkGroup, TtsStatus};
    use mockall::Sequence;

    fn chunk(id: ChunkId, index: u32, content: &str) -> Chunk {
        Chunk {
            id,
            book_id: 1,
            index,
            content: content.to_string(),
            audio_path: None,
            tts_status: TtsStatus::Completed,
        }
    }

    async fn service(store: &MemoryStore) -> JobQueueService {
        store.save_chunk(&chunk(1, 0, "first")).await.unwrap();
        store.save_chunk(&chunk(2, 1, "second")).await.unwrap();
        store.save_chunk(&chunk(3, 2, &"x".repeat(1990))).await.unwrap();
        JobQueueService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            PipelineSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_submit_validates_request() {
        let store = MemoryStore::new();
        let svc = service(&store).await;

        assert!(matches!(svc.submit(1, vec![]).await, Err(Error::Validation(_))));
        assert!(matches!(
            svc.submit(1, (1..=11).collect()).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(svc.submit(1, vec![1, 99]).await, Err(Error::Validation(_))));
        assert!(matches!(svc.submit(2, vec![1]).await, Err(Error::Validation(_))));
        // 5 + 6 + 1990 bytes
        assert!(matches!(
            svc.submit(1, vec![1, 2, 3]).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_queues_or_returns_existing() {
        let store = MemoryStore::new();
        let svc = service(&store).await;

        let job = match svc.submit(1, vec![2, 1]).await.unwrap() {
            Submission::Queued(job) => job,
            other => panic!("expected queued, got {:?}", other),
        };
        assert_eq!(svc.status(job.id).await.unwrap().status, JobStatus::Queued);

        store
            .record_group(ProcessedChunkGroup::new(
                GroupKey::new(1, 0, 1),
                PathBuf::from("final.ogg"),
            ))
            .await
            .unwrap();
        match svc.submit(1, vec![1, 2]).await.unwrap() {
            Submission::AlreadyAvailable(path) => assert_eq!(path, PathBuf::from("final.ogg")),
            other => panic!("expected existing artifact, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_runs_jobs_in_creation_order() {
        let store = MemoryStore::new();
        let first = QueueJob::new(1, vec![1]);
        let mut second = QueueJob::new(1, vec![2]);
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        store.enqueue_job(&second).await.unwrap();
        store.enqueue_job(&first).await.unwrap();

        let mut seq = Sequence::new();
        let mut merger = MockGroupMerger::new();
        merger
            .expect_merge_group()
            .withf(|book, ids| *book == 1 && ids.to_vec() == vec![1u64])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(PathBuf::from("a.ogg")));
        merger
            .expect_merge_group()
            .withf(|book, ids| *book == 1 && ids.to_vec() == vec![2u64])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::external("elevenlabs", "timed out")));

        let worker = JobWorker::new(
            Arc::new(store.clone()),
            Arc::new(merger),
            Duration::from_millis(10),
        );
        let done = worker.run_once().await.unwrap().unwrap();
        assert_eq!((done.id, done.status), (first.id, JobStatus::Complete));
        let done = worker.run_once().await.unwrap().unwrap();
        assert_eq!((done.id, done.status), (second.id, JobStatus::Failed));
        assert!(worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let store = MemoryStore::new();
        let worker = JobWorker::new(
            Arc::new(store),
            Arc::new(MockGroupMerger::new()),
            Duration::from_secs(3600),
        );
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), worker.run(shutdown))
            .await
            .unwrap();
    }
}
