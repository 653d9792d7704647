use crate::domain::chunks::{BookId, GroupKey};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Progress of one narration unit through the merge pipeline.
///
/// `Failed` is reachable from every non-terminal state. `Reused` is the
/// dedup shortcut out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "prompt_generated")]
    PromptGenerated,
    #[serde(rename = "background_synthesized")]
    BackgroundSynthesized,
    #[serde(rename = "base_mixed")]
    BaseMixed,
    #[serde(rename = "events_overlaid")]
    EventsOverlaid,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "completed (reused)")]
    Reused,
    #[serde(rename = "failed")]
    Failed,
}

impl UnitStatus {
    pub fn can_transition_to(self, next: UnitStatus) -> bool {
        use UnitStatus::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, PromptGenerated)
                | (Pending, Reused)
                | (PromptGenerated, BackgroundSynthesized)
                // background failed: narration alone becomes the base mix
                | (PromptGenerated, BaseMixed)
                | (BackgroundSynthesized, BaseMixed)
                | (BaseMixed, EventsOverlaid)
                | (BaseMixed, Completed)
                | (EventsOverlaid, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitStatus::Completed | UnitStatus::Reused | UnitStatus::Failed
        )
    }

    /// Completed units are the only ones whose audio may be reused.
    pub fn is_completed(self) -> bool {
        matches!(self, UnitStatus::Completed | UnitStatus::Reused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::PromptGenerated => "prompt_generated",
            UnitStatus::BackgroundSynthesized => "background_synthesized",
            UnitStatus::BaseMixed => "base_mixed",
            UnitStatus::EventsOverlaid => "events_overlaid",
            UnitStatus::Completed => "completed",
            UnitStatus::Reused => "completed (reused)",
            UnitStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let status = match s {
            "pending" => UnitStatus::Pending,
            "prompt_generated" => UnitStatus::PromptGenerated,
            "background_synthesized" => UnitStatus::BackgroundSynthesized,
            "base_mixed" => UnitStatus::BaseMixed,
            "events_overlaid" => UnitStatus::EventsOverlaid,
            "completed" => UnitStatus::Completed,
            "completed (reused)" => UnitStatus::Reused,
            "failed" => UnitStatus::Failed,
            other => {
                return Err(Error::Persistence(format!(
                    "unknown unit status {:?} needs migration",
                    other
                )))
            }
        };
        Ok(status)
    }
}

/// SHA-256 of the source narration text, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, used in artifact names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finished audio that a later request may reuse instead of synthesizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub unit_id: String,
    pub path: PathBuf,
}

/// The record the orchestrator drives: one narration audio + its source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationUnit {
    pub id: String,
    pub book_id: BookId,
    pub group: Option<GroupKey>,
    pub text_path: PathBuf,
    pub narration_path: PathBuf,
    pub final_path: Option<PathBuf>,
    pub content_hash: Option<ContentHash>,
    pub status: UnitStatus,
}

impl NarrationUnit {
    pub fn new(id: impl Into<String>, book_id: BookId, text_path: PathBuf, narration_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            book_id,
            group: None,
            text_path,
            narration_path,
            final_path: None,
            content_hash: None,
            status: UnitStatus::Pending,
        }
    }

    /// Unit covering a merged chunk group; its id is the group stem.
    pub fn for_group(key: GroupKey, text_path: PathBuf, narration_path: PathBuf) -> Self {
        let mut unit = Self::new(key.stem(), key.book_id, text_path, narration_path);
        unit.group = Some(key);
        unit
    }

    pub fn transition(&mut self, next: UnitStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Set the hash only if none was recorded yet.
    pub fn backfill_hash(&mut self, hash: &ContentHash) {
        if self.content_hash.is_none() {
            self.content_hash = Some(hash.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> NarrationUnit {
        NarrationUnit::new("u1", 1, PathBuf::from("t.txt"), PathBuf::from("n.mp3"))
    }

    #[test]
    fn test_full_pipeline_path() {
        let mut u = unit();
        for next in [
            UnitStatus::PromptGenerated,
            UnitStatus::BackgroundSynthesized,
            UnitStatus::BaseMixed,
            UnitStatus::EventsOverlaid,
            UnitStatus::Completed,
        ] {
            u.transition(next).unwrap();
        }
        assert!(u.status.is_completed());
    }

    #[test]
    fn test_events_stage_is_optional() {
        let mut u = unit();
        u.transition(UnitStatus::PromptGenerated).unwrap();
        u.transition(UnitStatus::BaseMixed).unwrap();
        u.transition(UnitStatus::Completed).unwrap();
    }

    #[test]
    fn test_failed_reachable_from_any_live_state() {
        for start in [
            UnitStatus::Pending,
            UnitStatus::PromptGenerated,
            UnitStatus::BackgroundSynthesized,
            UnitStatus::BaseMixed,
            UnitStatus::EventsOverlaid,
        ] {
            assert!(start.can_transition_to(UnitStatus::Failed), "{}", start);
        }
        assert!(!UnitStatus::Completed.can_transition_to(UnitStatus::Failed));
        assert!(!UnitStatus::Failed.can_transition_to(UnitStatus::Pending));
    }

    #[test]
    fn test_reuse_only_from_pending() {
        let mut u = unit();
        u.transition(UnitStatus::PromptGenerated).unwrap();
        assert!(u.transition(UnitStatus::Reused).is_err());
        assert_eq!(u.status, UnitStatus::PromptGenerated);
    }

    #[test]
    fn test_persisted_strings_round_trip() {
        let json = serde_json::to_string(&UnitStatus::Reused).unwrap();
        assert_eq!(json, "\"completed (reused)\"");
        assert_eq!(
            "completed (reused)".parse::<UnitStatus>().unwrap(),
            UnitStatus::Reused
        );
        assert!("done-ish".parse::<UnitStatus>().is_err());
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = ContentHash::of(b"abc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash.short(), "ba7816bf");
    }

    #[test]
    fn test_backfill_keeps_existing_hash() {
        let mut u = unit();
        u.backfill_hash(&ContentHash::of(b"first"));
        u.backfill_hash(&ContentHash::of(b"second"));
        assert_eq!(u.content_hash, Some(ContentHash::of(b"first")));
    }
}
