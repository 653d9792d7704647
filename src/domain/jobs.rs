use crate::domain::chunks::{BookId, ChunkId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of a queued merge request. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Complete)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batched merge request waiting for the single queue consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: Uuid,
    pub book_id: BookId,
    pub chunk_ids: Vec<ChunkId>,
    pub status: JobStatus,
    /// Defines FIFO order
    pub created_at: DateTime<Utc>,
}

impl QueueJob {
    pub fn new(book_id: BookId, chunk_ids: Vec<ChunkId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            chunk_ids,
            status: JobStatus::Queued,
            created_at: Utc::now(),
        }
    }

    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut job = QueueJob::new(1, vec![10, 11]);
        assert_eq!(job.status, JobStatus::Queued);
        job.transition(JobStatus::Processing).unwrap();
        job.transition(JobStatus::Complete).unwrap();
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        let mut job = QueueJob::new(1, vec![10]);
        assert!(job.transition(JobStatus::Complete).is_err());
        job.transition(JobStatus::Processing).unwrap();
        assert!(job.transition(JobStatus::Queued).is_err());
        job.transition(JobStatus::Failed).unwrap();
        // no automatic retry
        assert!(job.transition(JobStatus::Processing).is_err());
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let parsed: JobStatus = serde_json::from_str("\"complete\"").unwrap();
        assert_eq!(parsed, JobStatus::Complete);
        assert!(serde_json::from_str::<JobStatus>("\"done\"").is_err());
    }
}
