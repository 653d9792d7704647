//! Interactive narration: synthesize speech for one or two pages, then merge
//! them in the background.

use super::dispatcher::{MergeDispatcher, MergeHandle};
use super::merge::{ChunkMergeService, PreparedMerge};
use super::resolver::ChunkGroupResolver;
use crate::domain::chunks::{BookId, Chunk, ChunkId, TtsStatus};
use crate::error::{Error, Result};
use crate::ports::collaborators::NarrationSynthesizer;
use crate::ports::repository::ChunkRepository;
use crate::ports::storage::ArtifactStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const MAX_PAGES: usize = 2;

#[derive(Debug)]
pub struct NarrationReport {
    pub audio_paths: Vec<PathBuf>,
    pub failed: Vec<ChunkId>,
    /// Set when a background merge was started
    pub merge: Option<MergeHandle>,
    /// Set when the page range was merged before
    pub existing: Option<PathBuf>,
}

pub struct NarrationService {
    chunks: Arc<dyn ChunkRepository>,
    store: Arc<dyn ArtifactStore>,
    narrator: Arc<dyn NarrationSynthesizer>,
    merges: Arc<ChunkMergeService>,
    dispatcher: Arc<MergeDispatcher>,
}

/// 1-based page numbers to chunk indices.
fn page_indices(pages: &[u32]) -> Result<Vec<u32>> {
    if pages.is_empty() || pages.len() > MAX_PAGES {
        return Err(Error::validation(format!(
            "1 to {} pages required, got {}",
            MAX_PAGES,
            pages.len()
        )));
    }
    pages
        .iter()
        .map(|p| {
            p.checked_sub(1)
                .ok_or_else(|| Error::validation("page numbers start at 1"))
        })
        .collect()
}

impl NarrationService {
    pub fn new(
        chunks: Arc<dyn ChunkRepository>,
        store: Arc<dyn ArtifactStore>,
        narrator: Arc<dyn NarrationSynthesizer>,
        merges: Arc<ChunkMergeService>,
        dispatcher: Arc<MergeDispatcher>,
    ) -> Self {
        Self {
            chunks,
            store,
            narrator,
            merges,
            dispatcher,
        }
    }

    pub async fn narrate_pages(&self, book_id: BookId, pages: &[u32]) -> Result<NarrationReport> {
        let indices = page_indices(pages)?;
        let mut chunks = self.chunks.find_by_indices(book_id, &indices).await?;
        if chunks.len() != pages.len() {
            return Err(Error::validation(format!(
                "invalid page numbers {:?} for book {}",
                pages, book_id
            )));
        }
        chunks.sort_by_key(|c| c.index);
        ChunkGroupResolver::reject_completed(&chunks)?;

        let mut audio_paths = Vec::new();
        let mut failed = Vec::new();
        for chunk in &mut chunks {
            match self.narrate(chunk).await {
                Ok(path) => audio_paths.push(path),
                Err(e) => {
                    warn!(book_id, chunk = chunk.id, error = %e, "narration failed");
                    failed.push(chunk.id);
                }
            }
        }

        let mut report = NarrationReport {
            audio_paths,
            failed,
            merge: None,
            existing: None,
        };
        if report.audio_paths.is_empty() {
            warn!(book_id, "no narration produced, skipping merge");
            return Ok(report);
        }

        let ids: Vec<ChunkId> = chunks.iter().map(|c| c.id).collect();
        match self.merges.prepare(book_id, &ids).await {
            Ok(PreparedMerge::Existing(path)) => report.existing = Some(path),
            Ok(PreparedMerge::Ready(unit)) => report.merge = Some(self.dispatcher.dispatch(unit)),
            Err(e) => warn!(book_id, error = %e, "merge could not be prepared"),
        }
        Ok(report)
    }

    /// Synthesize one chunk, keeping its status current in the repository.
    async fn narrate(&self, chunk: &mut Chunk) -> Result<PathBuf> {
        chunk.tts_status = TtsStatus::Processing;
        self.chunks.save_chunk(chunk).await?;

        let produced = async {
            let audio = self.narrator.synthesize(&chunk.content).await?;
            self.store
                .write(&format!("chunk_{}.mp3", chunk.id), &audio)
                .await
        }
        .await;

        match produced {
            Ok(path) => {
                chunk.audio_path = Some(path.clone());
                chunk.tts_status = TtsStatus::Completed;
                self.chunks.save_chunk(chunk).await?;
                info!(chunk = chunk.id, ?path, "chunk narrated");
                Ok(path)
            }
            Err(e) => {
                chunk.tts_status = TtsStatus::Failed;
                self.chunks.save_chunk(chunk).await?;
                Err(e)
            }
        }
    }
}
