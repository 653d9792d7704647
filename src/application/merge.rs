//! Chunk-group merges: resolve the group, reuse a previous result when the
//! range was already merged, otherwise hand a fresh unit to the orchestrator.

use super::orchestrator::MergeOrchestrator;
use super::queue::GroupMerger;
use super::resolver::ChunkGroupResolver;
use crate::domain::chunks::{BookId, ChunkId};
use crate::domain::units::NarrationUnit;
use crate::error::Result;
use crate::ports::repository::DedupStore;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub enum PreparedMerge {
    /// The range already has an authoritative artifact
    Existing(PathBuf),
    /// Merged inputs are written; the unit is ready for the orchestrator
    Ready(NarrationUnit),
}

pub struct ChunkMergeService {
    resolver: ChunkGroupResolver,
    dedup: Arc<dyn DedupStore>,
    orchestrator: Arc<MergeOrchestrator>,
}

impl ChunkMergeService {
    pub fn new(
        resolver: ChunkGroupResolver,
        dedup: Arc<dyn DedupStore>,
        orchestrator: Arc<MergeOrchestrator>,
    ) -> Self {
        Self {
            resolver,
            dedup,
            orchestrator,
        }
    }

    pub async fn prepare(&self, book_id: BookId, chunk_ids: &[ChunkId]) -> Result<PreparedMerge> {
        let chunks = self.resolver.load(book_id, chunk_ids).await?;
        let key = ChunkGroupResolver::key_for(book_id, &chunks)?;
        if let Some(group) = self.dedup.lookup_by_range(&key).await? {
            info!(group = %key, path = ?group.audio_path, "chunk group already processed");
            return Ok(PreparedMerge::Existing(group.audio_path));
        }
        let resolved = self.resolver.assemble(key, &chunks).await?;
        Ok(PreparedMerge::Ready(NarrationUnit::for_group(
            key,
            resolved.text_path,
            resolved.narration_path,
        )))
    }
}

#[async_trait]
impl GroupMerger for ChunkMergeService {
    async fn merge_group(&self, book_id: BookId, chunk_ids: &[ChunkId]) -> Result<PathBuf> {
        match self.prepare(book_id, chunk_ids).await? {
            PreparedMerge::Existing(path) => Ok(path),
            PreparedMerge::Ready(unit) => Ok(self.orchestrator.merge(unit).await?.final_path),
        }
    }
}
