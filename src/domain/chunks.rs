use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub type BookId = u64;
pub type ChunkId = u64;

/// Narration state of a chunk. Only the narration path mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One slice of an uploaded book, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub book_id: BookId,
    pub index: u32,
    pub content: String,
    pub audio_path: Option<PathBuf>,
    pub tts_status: TtsStatus,
}

impl Chunk {
    /// Only mp3 narration can be stream-copied into a group.
    pub fn has_compatible_audio(&self) -> bool {
        self.audio_path
            .as_deref()
            .map(is_compatible_audio)
            .unwrap_or(false)
    }
}

pub fn is_compatible_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

/// Identity of a chunk group: (book, first index, last index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub book_id: BookId,
    pub start_index: u32,
    pub end_index: u32,
}

impl GroupKey {
    pub fn new(book_id: BookId, start_index: u32, end_index: u32) -> Self {
        Self {
            book_id,
            start_index,
            end_index,
        }
    }

    /// Deterministic artifact stem for this group.
    pub fn stem(&self) -> String {
        format!(
            "book_{}_chunks_{}_{}",
            self.book_id, self.start_index, self.end_index
        )
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "book {} [{}-{}]",
            self.book_id, self.start_index, self.end_index
        )
    }
}

/// Authoritative record of a merged chunk group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedChunkGroup {
    pub key: GroupKey,
    pub audio_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl ProcessedChunkGroup {
    pub fn new(key: GroupKey, audio_path: PathBuf) -> Self {
        Self {
            key,
            audio_path,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: Option<&str>) -> Chunk {
        Chunk {
            id: 1,
            book_id: 1,
            index: 0,
            content: String::new(),
            audio_path: path.map(PathBuf::from),
            tts_status: TtsStatus::Completed,
        }
    }

    #[test]
    fn test_compatible_audio_is_mp3_only() {
        assert!(chunk(Some("a/chunk_1.mp3")).has_compatible_audio());
        assert!(chunk(Some("a/chunk_1.MP3")).has_compatible_audio());
        assert!(!chunk(Some("a/chunk_1.wav")).has_compatible_audio());
        assert!(!chunk(Some("a/chunk_1")).has_compatible_audio());
        assert!(!chunk(None).has_compatible_audio());
    }

    #[test]
    fn test_group_stem_is_deterministic() {
        let key = GroupKey::new(7, 3, 4);
        assert_eq!(key.stem(), "book_7_chunks_3_4");
        assert_eq!(key.to_string(), "book 7 [3-4]");
    }
}
