//! Redis repository and dedup store implementations.

use super::error::StoreError;
use super::pool::RedisPool;
use super::{CHUNK_INDEX_PREFIX, CHUNK_PREFIX, GROUP_PREFIX, HASH_PREFIX, UNIT_PREFIX};
use crate::domain::chunks::{BookId, Chunk, ChunkId, GroupKey, ProcessedChunkGroup};
use crate::domain::units::{Artifact, ContentHash, NarrationUnit};
use crate::error::{Error, Result};
use crate::ports::repository::{ChunkRepository, DedupStore, UnitRepository};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

fn group_key(key: &GroupKey) -> String {
    format!(
        "{}{}:{}:{}",
        GROUP_PREFIX, key.book_id, key.start_index, key.end_index
    )
}

fn chunk_index_key(book_id: BookId, index: u32) -> String {
    format!("{}{}:{}", CHUNK_INDEX_PREFIX, book_id, index)
}

#[async_trait]
impl ChunkRepository for RedisPool {
    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let mut conn = self.conn().await?;
        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            let key = format!("{}{}", CHUNK_PREFIX, id);
            if let Some(chunk) = RedisPool::get_json(&mut conn, &key).await? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    async fn find_by_indices(&self, book_id: BookId, indices: &[u32]) -> Result<Vec<Chunk>> {
        let mut ids = Vec::with_capacity(indices.len());
        {
            let mut conn = self.conn().await?;
            for index in indices {
                let id: Option<ChunkId> = conn
                    .get(chunk_index_key(book_id, *index))
                    .await
                    .map_err(StoreError::from)?;
                ids.extend(id);
            }
        }
        self.get_chunks(&ids).await
    }

    async fn save_chunk(&self, chunk: &Chunk) -> Result<()> {
        let mut conn = self.conn().await?;
        let key = format!("{}{}", CHUNK_PREFIX, chunk.id);
        RedisPool::set_json(&mut conn, &key, chunk).await?;
        conn.set::<_, _, ()>(chunk_index_key(chunk.book_id, chunk.index), chunk.id)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}

#[async_trait]
impl DedupStore for RedisPool {
    async fn lookup_by_hash(&self, hash: &ContentHash) -> Result<Option<Artifact>> {
        let mut conn = self.conn().await?;
        let key = format!("{}{}", HASH_PREFIX, hash);
        Ok(RedisPool::get_json(&mut conn, &key).await?)
    }

    async fn lookup_by_range(&self, key: &GroupKey) -> Result<Option<ProcessedChunkGroup>> {
        let mut conn = self.conn().await?;
        Ok(RedisPool::get_json(&mut conn, &group_key(key)).await?)
    }

    async fn record_group(&self, group: ProcessedChunkGroup) -> Result<ProcessedChunkGroup> {
        let mut conn = self.conn().await?;
        let key = group_key(&group.key);
        if RedisPool::set_json_nx(&mut conn, &key, &group).await? {
            return Ok(group);
        }
        RedisPool::get_json(&mut conn, &key)
            .await?
            .ok_or_else(|| Error::Persistence(format!("group {} vanished after insert", group.key)))
    }

    async fn record_hash(&self, hash: &ContentHash, artifact: &Artifact) -> Result<()> {
        let mut conn = self.conn().await?;
        let key = format!("{}{}", HASH_PREFIX, hash);
        RedisPool::set_json_nx(&mut conn, &key, artifact).await?;
        Ok(())
    }
}

#[async_trait]
impl UnitRepository for RedisPool {
    async fn get_unit(&self, id: &str) -> Result<Option<NarrationUnit>> {
        let mut conn = self.conn().await?;
        let key = format!("{}{}", UNIT_PREFIX, id);
        Ok(RedisPool::get_json(&mut conn, &key).await?)
    }

    async fn save_unit(&self, unit: &NarrationUnit) -> Result<()> {
        let mut conn = self.conn().await?;
        let key = format!("{}{}", UNIT_PREFIX, unit.id);
        RedisPool::set_json(&mut conn, &key, unit).await?;
        Ok(())
    }
}
