//! In-process store for single-node runs and tests.
//!
//! One `RwLock` guards every table, so `record_group` and `claim_next` are
//! atomic with respect to each other.

use crate::domain::chunks::{BookId, Chunk, ChunkId, GroupKey, ProcessedChunkGroup};
use crate::domain::jobs::{JobStatus, QueueJob};
use crate::domain::units::{Artifact, ContentHash, NarrationUnit};
use crate::error::{Error, Result};
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::{ChunkRepository, DedupStore, UnitRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    chunks: HashMap<ChunkId, Chunk>,
    groups: HashMap<GroupKey, ProcessedChunkGroup>,
    hashes: HashMap<ContentHash, Artifact>,
    units: HashMap<String, NarrationUnit>,
    /// Insertion order breaks ties between equal creation times
    jobs: Vec<QueueJob>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkRepository for MemoryStore {
    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.chunks.get(id).cloned())
            .collect())
    }

    async fn find_by_indices(&self, book_id: BookId, indices: &[u32]) -> Result<Vec<Chunk>> {
        let tables = self.tables.read().await;
        Ok(tables
            .chunks
            .values()
            .filter(|c| c.book_id == book_id && indices.contains(&c.index))
            .cloned()
            .collect())
    }

    async fn save_chunk(&self, chunk: &Chunk) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.chunks.insert(chunk.id, chunk.clone());
        Ok(())
    }
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn lookup_by_hash(&self, hash: &ContentHash) -> Result<Option<Artifact>> {
        let tables = self.tables.read().await;
        Ok(tables.hashes.get(hash).cloned())
    }

    async fn lookup_by_range(&self, key: &GroupKey) -> Result<Option<ProcessedChunkGroup>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.get(key).cloned())
    }

    async fn record_group(&self, group: ProcessedChunkGroup) -> Result<ProcessedChunkGroup> {
        let mut tables = self.tables.write().await;
        Ok(tables.groups.entry(group.key).or_insert(group).clone())
    }

    async fn record_hash(&self, hash: &ContentHash, artifact: &Artifact) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .hashes
            .entry(hash.clone())
            .or_insert_with(|| artifact.clone());
        Ok(())
    }
}

#[async_trait]
impl UnitRepository for MemoryStore {
    async fn get_unit(&self, id: &str) -> Result<Option<NarrationUnit>> {
        let tables = self.tables.read().await;
        Ok(tables.units.get(id).cloned())
    }

    async fn save_unit(&self, unit: &NarrationUnit) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.units.insert(unit.id.clone(), unit.clone());
        Ok(())
    }
}

#[async_trait]
impl JobQueuePort for MemoryStore {
    async fn enqueue_job(&self, job: &QueueJob) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.jobs.push(job.clone());
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<QueueJob>> {
        let mut tables = self.tables.write().await;
        let next = tables
            .jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| j.created_at);
        match next {
            Some(job) => {
                job.transition(JobStatus::Processing)?;
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<QueueJob> {
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;
        job.transition(status)?;
        Ok(job.clone())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<QueueJob>> {
        let tables = self.tables.read().await;
        Ok(tables.jobs.iter().find(|j| j.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_claims_oldest_queued_job_first() {
        let store = MemoryStore::new();
        let mut newer = QueueJob::new(1, vec![3, 4]);
        let mut older = QueueJob::new(1, vec![1, 2]);
        older.created_at = newer.created_at - Duration::seconds(10);
        newer.created_at += Duration::seconds(1);
        store.enqueue_job(&newer).await.unwrap();
        store.enqueue_job(&older).await.unwrap();

        let first = store.claim_next().await.unwrap().unwrap();
        assert_eq!(first.id, older.id);
        assert_eq!(first.status, JobStatus::Processing);

        let second = store.claim_next().await.unwrap().unwrap();
        assert_eq!(second.id, newer.id);
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_never_moves_backwards() {
        let store = MemoryStore::new();
        let job = QueueJob::new(1, vec![1]);
        store.enqueue_job(&job).await.unwrap();
        store.claim_next().await.unwrap();
        store.update_status(job.id, JobStatus::Complete).await.unwrap();

        let err = store
            .update_status(job.id, JobStatus::Queued)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(
            store.get_job(job.id).await.unwrap().unwrap().status,
            JobStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_first_group_record_is_authoritative() {
        let store = MemoryStore::new();
        let key = GroupKey::new(7, 3, 4);
        let first = store
            .record_group(ProcessedChunkGroup::new(key, PathBuf::from("a.ogg")))
            .await
            .unwrap();
        let second = store
            .record_group(ProcessedChunkGroup::new(key, PathBuf::from("b.ogg")))
            .await
            .unwrap();
        assert_eq!(first.audio_path, second.audio_path);
        assert_eq!(
            store.lookup_by_range(&key).await.unwrap().unwrap().audio_path,
            PathBuf::from("a.ogg")
        );
    }
}
