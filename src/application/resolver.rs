//! Turns a set of narration chunks into one text + audio unit.

use crate::domain::av::cmd::Compositor;
use crate::domain::av::graph::render_concat_list;
use crate::domain::av::mix::concat_invocation;
use crate::domain::chunks::{BookId, Chunk, ChunkId, GroupKey, TtsStatus};
use crate::error::{Error, Result};
use crate::ports::repository::ChunkRepository;
use crate::ports::storage::ArtifactStore;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Merged artifacts of one chunk group, named after its key.
#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub key: GroupKey,
    pub text_path: PathBuf,
    pub narration_path: PathBuf,
    /// Chunks whose narration made it into the merged audio
    pub included: Vec<ChunkId>,
    /// Chunks left out for lack of mp3 narration
    pub skipped: Vec<ChunkId>,
}

pub struct ChunkGroupResolver {
    chunks: Arc<dyn ChunkRepository>,
    store: Arc<dyn ArtifactStore>,
    compositor: Arc<dyn Compositor>,
}

impl ChunkGroupResolver {
    pub fn new(
        chunks: Arc<dyn ChunkRepository>,
        store: Arc<dyn ArtifactStore>,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        Self {
            chunks,
            store,
            compositor,
        }
    }

    /// Fetch the chunks of one book in index order.
    ///
    /// Every id must exist and belong to `book_id`.
    pub async fn load(&self, book_id: BookId, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let wanted: BTreeSet<ChunkId> = ids.iter().copied().collect();
        if wanted.is_empty() {
            return Err(Error::validation("no chunk ids given"));
        }
        let ids: Vec<ChunkId> = wanted.iter().copied().collect();
        let mut chunks = self.chunks.get_chunks(&ids).await?;

        let missing: Vec<ChunkId> = wanted
            .iter()
            .filter(|id| !chunks.iter().any(|c| c.id == **id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(Error::validation(format!("chunks not found: {:?}", missing)));
        }
        if let Some(stray) = chunks.iter().find(|c| c.book_id != book_id) {
            return Err(Error::validation(format!(
                "chunk {} belongs to book {}, not {}",
                stray.id, stray.book_id, book_id
            )));
        }
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    /// Key spanning the first and last chunk of an index-ordered group.
    pub fn key_for(book_id: BookId, chunks: &[Chunk]) -> Result<GroupKey> {
        match (chunks.first(), chunks.last()) {
            (Some(first), Some(last)) => Ok(GroupKey::new(book_id, first.index, last.index)),
            _ => Err(Error::validation("empty chunk group")),
        }
    }

    /// Interactive requests may not touch chunks that were already narrated.
    pub fn reject_completed(chunks: &[Chunk]) -> Result<()> {
        let done: Vec<ChunkId> = chunks
            .iter()
            .filter(|c| c.tts_status == TtsStatus::Completed)
            .map(|c| c.id)
            .collect();
        if done.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "chunks already processed: {:?}",
                done
            )))
        }
    }

    /// Write the merged text and the stream-copied narration for `chunks`.
    ///
    /// Text is newline-joined in index order. Chunks without mp3 narration are
    /// left out of the audio; a group with no usable narration is rejected.
    pub async fn assemble(&self, key: GroupKey, chunks: &[Chunk]) -> Result<ResolvedGroup> {
        let stem = key.stem();
        let text: String = chunks
            .iter()
            .map(|c| format!("{}\n", c.content))
            .collect();
        let text_path = self.store.write(&format!("{}.txt", stem), text.as_bytes()).await?;

        let mut included = Vec::new();
        let mut skipped = Vec::new();
        let mut entries = Vec::new();
        for chunk in chunks {
            match chunk.audio_path.as_deref() {
                Some(audio) if chunk.has_compatible_audio() => {
                    let absolute = tokio::fs::canonicalize(audio).await.map_err(|_| {
                        Error::NotFound(format!("narration of chunk {}: {:?}", chunk.id, audio))
                    })?;
                    entries.push(absolute);
                    included.push(chunk.id);
                }
                _ => {
                    warn!(group = %key, chunk = chunk.id, "skipping chunk without mp3 narration");
                    skipped.push(chunk.id);
                }
            }
        }
        if entries.is_empty() {
            return Err(Error::validation(format!(
                "no chunk in {} has mp3 narration",
                key
            )));
        }

        let list = self
            .store
            .write(
                &format!("audio_list_{}.txt", Uuid::new_v4()),
                render_concat_list(&entries).as_bytes(),
            )
            .await?;
        let narration_path = self.store.path_for(&format!("{}.mp3", stem));
        let concat = self
            .compositor
            .run(&concat_invocation(&list, entries, &narration_path))
            .await;
        if let Err(e) = self.store.remove(&list).await {
            debug!(?list, error = %e, "could not remove concat list");
        }
        concat?;

        info!(group = %key, chunks = included.len(), skipped = skipped.len(), "chunk group assembled");
        Ok(ResolvedGroup {
            key,
            text_path,
            narration_path,
            included,
            skipped,
        })
    }

    /// `load` + `assemble` for a batch re-merge.
    pub async fn resolve(&self, book_id: BookId, ids: &[ChunkId]) -> Result<ResolvedGroup> {
        let chunks = self.load(book_id, ids).await?;
        let key = Self::key_for(book_id, &chunks)?;
        self.assemble(key, &chunks).await
    }
}
