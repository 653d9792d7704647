//! Application layer - Use cases wired against ports.

pub mod dispatcher;
pub mod merge;
pub mod narration;
pub mod orchestrator;
pub mod overlay;
pub mod planner;
pub mod queue;
pub mod resolver;


use crate::config::PipelineSettings;
use crate::domain::av::cmd::Compositor;
use crate::ports::collaborators::{ClipGenerator, NarrationSynthesizer, TextAnalyzer};
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::{ChunkRepository, DedupStore, UnitRepository};
use crate::ports::storage::ArtifactStore;
use std::sync::Arc;

/// Every port the services depend on, shared behind `Arc`s.
#[derive(Clone)]
pub struct Ports {
    pub chunks: Arc<dyn ChunkRepository>,
    pub units: Arc<dyn UnitRepository>,
    pub dedup: Arc<dyn DedupStore>,
    pub queue: Arc<dyn JobQueuePort>,
    pub store: Arc<dyn ArtifactStore>,
    pub analyzer: Arc<dyn TextAnalyzer>,
    pub clips: Arc<dyn ClipGenerator>,
    pub narrator: Arc<dyn NarrationSynthesizer>,
    pub compositor: Arc<dyn Compositor>,
    pub settings: PipelineSettings,
}
