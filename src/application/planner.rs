//! Mood segmentation of the narration timeline.
//!
//! The text-analysis collaborator proposes a plan; whenever it fails, returns
//! a non-success status, or its output does not validate, the planner falls
//! back to the equal neutral split. The fallback is the only recovery: a
//! primary plan is used as returned, gaps and overlaps included.

use crate::config::PipelineSettings;
use crate::domain::model_output::parse_segment_plan;
use crate::domain::segments::{excerpt, fallback_segments, required_segment_count, Segment};
use crate::error::Result;
use crate::ports::collaborators::TextAnalyzer;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Analysis,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub segments: Vec<Segment>,
    pub source: PlanSource,
}

pub struct SegmentPlanner {
    analyzer: Arc<dyn TextAnalyzer>,
    settings: PipelineSettings,
}

impl SegmentPlanner {
    pub fn new(analyzer: Arc<dyn TextAnalyzer>, settings: PipelineSettings) -> Self {
        Self { analyzer, settings }
    }

    /// Plan segments for `duration` seconds of narration of `text`.
    ///
    /// Only an invalid duration is an error.
    pub async fn plan(&self, duration: f64, text: &str) -> Result<SegmentPlan> {
        let clip = self.settings.source_clip_seconds;
        let fallback = fallback_segments(duration, clip)?;
        let count = required_segment_count(duration, clip);
        let excerpt = excerpt(text, self.settings.segment_excerpt_chars);

        let raw = match self.analyzer.segment_plan(duration, &excerpt, count).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, duration, "segmentation unavailable, using equal split");
                return Ok(SegmentPlan {
                    segments: fallback,
                    source: PlanSource::Fallback,
                });
            }
        };

        match parse_segment_plan(&raw) {
            Ok(segments) => {
                if segments.len() != count {
                    debug!(requested = count, got = segments.len(), "segment count differs");
                }
                Ok(SegmentPlan {
                    segments,
                    source: PlanSource::Analysis,
                })
            }
            Err(e) => {
                warn!(error = %e, duration, "segment plan rejected, using equal split");
                Ok(SegmentPlan {
                    segments: fallback,
                    source: PlanSource::Fallback,
                })
            }
        }
    }
}
