use crate::domain::chunks::{BookId, Chunk, ChunkId, GroupKey, ProcessedChunkGroup};
use crate::domain::units::{Artifact, ContentHash, NarrationUnit};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Chunks found among `ids`, in no particular order
    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>>;

    /// Chunks of `book_id` at the given ordering indices
    async fn find_by_indices(&self, book_id: BookId, indices: &[u32]) -> Result<Vec<Chunk>>;

    async fn save_chunk(&self, chunk: &Chunk) -> Result<()>;
}

/// Lookup of previously produced artifacts. Entries are durable and never
/// evicted.
///
/// Two concurrent first-time requests for one key may both miss and both
/// synthesize; `record_group` keeps the first record written.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Completed artifact whose source text has this hash
    async fn lookup_by_hash(&self, hash: &ContentHash) -> Result<Option<Artifact>>;

    async fn lookup_by_range(&self, key: &GroupKey) -> Result<Option<ProcessedChunkGroup>>;

    /// Insert unless a record exists for the key; returns the authoritative one
    async fn record_group(&self, group: ProcessedChunkGroup) -> Result<ProcessedChunkGroup>;

    async fn record_hash(&self, hash: &ContentHash, artifact: &Artifact) -> Result<()>;
}

#[async_trait]
pub trait UnitRepository: Send + Sync {
    async fn get_unit(&self, id: &str) -> Result<Option<NarrationUnit>>;

    async fn save_unit(&self, unit: &NarrationUnit) -> Result<()>;
}
