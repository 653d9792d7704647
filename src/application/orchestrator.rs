//! Merge orchestrator: drives one narration unit from `pending` to a single
//! merged artifact.
//!
//! ```text
//! pending -> prompt_generated -> background_synthesized -> base_mixed
//!         -> [events_overlaid] -> completed
//! pending -> completed (reused)
//! any live state -> failed
//! ```
//!
//! Only the style prompt, the music clip, the narration probe and the base mix
//! are fatal. A failed background falls back to narration alone; a failed
//! event stage keeps the base mix.

use super::overlay::EventOverlayEngine;
use super::planner::SegmentPlanner;
use super::Ports;
use crate::config::PipelineSettings;
use crate::domain::av::background::{remove_all, BackgroundSynthesizer};
use crate::domain::av::cmd::Compositor;
use crate::domain::av::effects::EffectCache;
use crate::domain::av::mix::base_mix_invocation;
use crate::domain::chunks::{GroupKey, ProcessedChunkGroup};
use crate::domain::units::{Artifact, ContentHash, NarrationUnit, UnitStatus};
use crate::error::{Error, Result};
use crate::ports::collaborators::{ClipGenerator, TextAnalyzer};
use crate::ports::repository::{DedupStore, UnitRepository};
use crate::ports::storage::ArtifactStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub unit_id: String,
    pub status: UnitStatus,
    pub final_path: PathBuf,
}

pub struct MergeOrchestrator {
    units: Arc<dyn UnitRepository>,
    dedup: Arc<dyn DedupStore>,
    store: Arc<dyn ArtifactStore>,
    analyzer: Arc<dyn TextAnalyzer>,
    clips: Arc<dyn ClipGenerator>,
    compositor: Arc<dyn Compositor>,
    planner: SegmentPlanner,
    overlay: EventOverlayEngine,
    settings: PipelineSettings,
}

impl MergeOrchestrator {
    pub fn new(ports: &Ports, effects: Arc<EffectCache>, effect_concurrency: usize) -> Self {
        Self {
            units: ports.units.clone(),
            dedup: ports.dedup.clone(),
            store: ports.store.clone(),
            analyzer: ports.analyzer.clone(),
            clips: ports.clips.clone(),
            compositor: ports.compositor.clone(),
            planner: SegmentPlanner::new(ports.analyzer.clone(), ports.settings.clone()),
            overlay: EventOverlayEngine::new(
                ports.analyzer.clone(),
                ports.clips.clone(),
                ports.compositor.clone(),
                ports.store.clone(),
                effects,
                ports.settings.clone(),
                effect_concurrency,
            ),
            settings: ports.settings.clone(),
        }
    }

    /// Run the pipeline for `unit`. Failures leave the unit `failed` and are
    /// returned; intermediates are removed in the background either way.
    pub async fn merge(&self, mut unit: NarrationUnit) -> Result<MergeOutcome> {
        let mut scratch = Vec::new();
        let result = self.drive(&mut unit, &mut scratch).await;

        if !scratch.is_empty() {
            tokio::spawn(async move {
                remove_all(&scratch).await;
            });
        }

        match result {
            Ok(final_path) => Ok(MergeOutcome {
                unit_id: unit.id,
                status: unit.status,
                final_path,
            }),
            Err(e) => {
                self.mark_failed(&mut unit, &e).await;
                Err(e)
            }
        }
    }

    /// `merge`, abandoned as soon as `token` is cancelled.
    ///
    /// Dropping the pipeline kills any running compositor process.
    pub async fn merge_cancellable(
        &self,
        unit: NarrationUnit,
        token: CancellationToken,
    ) -> Result<MergeOutcome> {
        let pending = unit.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.abandon(pending).await;
                Err(Error::Cancelled)
            }
            outcome = self.merge(unit) => outcome,
        }
    }

    /// Mark a unit that will not run to completion as failed.
    pub async fn abandon(&self, mut unit: NarrationUnit) {
        if let Ok(Some(stored)) = self.units.get_unit(&unit.id).await {
            unit = stored;
        }
        self.mark_failed(&mut unit, &Error::Cancelled).await;
    }

    async fn drive(&self, unit: &mut NarrationUnit, scratch: &mut Vec<PathBuf>) -> Result<PathBuf> {
        let id = unit.id.clone();
        self.units.save_unit(unit).await?;

        for path in [&unit.text_path, &unit.narration_path] {
            if !self.store.exists(path).await {
                return Err(Error::NotFound(format!("unit {} input {:?}", id, path)));
            }
        }
        let text = String::from_utf8_lossy(&self.store.read(&unit.text_path).await?).into_owned();
        let hash = unit
            .content_hash
            .clone()
            .unwrap_or_else(|| ContentHash::of(text.as_bytes()));

        if let Some(existing) = self.find_reusable(unit, &hash).await? {
            unit.final_path = Some(existing.clone());
            unit.backfill_hash(&hash);
            unit.transition(UnitStatus::Reused)?;
            self.units.save_unit(unit).await?;
            if let Some(key) = unit.group {
                self.record_range(key, &existing).await?;
            }
            info!(unit = %id, path = ?existing, "reusing existing artifact");
            return Ok(existing);
        }

        let prompt = self.analyzer.style_prompt(&text).await?;
        debug!(unit = %id, prompt = %prompt, "style prompt");
        self.advance(unit, UnitStatus::PromptGenerated).await?;

        let source_audio = self
            .clips
            .generate(&prompt, self.settings.source_clip_seconds)
            .await?;
        let source = self
            .store
            .write(&format!("{}_bg_source.mp3", id), &source_audio)
            .await?;
        scratch.push(source.clone());

        let duration = self.compositor.probe_duration(&unit.narration_path).await?;
        let plan = self.planner.plan(duration, &text).await?;
        debug!(unit = %id, duration, segments = plan.segments.len(), source = ?plan.source, "segments planned");

        let synthesizer = BackgroundSynthesizer::new(
            self.compositor.as_ref(),
            &self.settings,
            self.store.work_dir(),
        );
        let base = match synthesizer
            .synthesize(&id, &source, duration, &plan.segments)
            .await
        {
            Ok(track) => {
                scratch.extend(track.transient.iter().cloned());
                scratch.push(track.path.clone());
                self.advance(unit, UnitStatus::BackgroundSynthesized).await?;

                let merged = self
                    .store
                    .path_for(&format!("merged_{}_{}.ogg", id, hash.short()));
                self.compositor
                    .run(&base_mix_invocation(
                        &unit.narration_path,
                        &track.path,
                        &self.settings,
                        &merged,
                    ))
                    .await?;
                merged
            }
            Err(e) => {
                warn!(unit = %id, error = %e, "background unavailable, using narration alone");
                unit.narration_path.clone()
            }
        };
        self.advance(unit, UnitStatus::BaseMixed).await?;

        let final_path = match self.overlay_events(&id, &hash, duration, &text, &base).await {
            Some(path) => {
                self.advance(unit, UnitStatus::EventsOverlaid).await?;
                path
            }
            None => base,
        };

        unit.final_path = Some(final_path.clone());
        unit.backfill_hash(&hash);
        unit.transition(UnitStatus::Completed)?;
        self.persist_completed(unit, &hash, &final_path).await?;
        info!(unit = %id, path = ?final_path, "merge completed");
        Ok(final_path)
    }

    async fn find_reusable(
        &self,
        unit: &NarrationUnit,
        hash: &ContentHash,
    ) -> Result<Option<PathBuf>> {
        if let Some(artifact) = self.dedup.lookup_by_hash(hash).await? {
            return Ok(Some(artifact.path));
        }
        if let Some(key) = unit.group {
            if let Some(group) = self.dedup.lookup_by_range(&key).await? {
                return Ok(Some(group.audio_path));
            }
        }
        Ok(None)
    }

    /// Best-effort Foley stage; `None` keeps the base mix.
    async fn overlay_events(
        &self,
        id: &str,
        hash: &ContentHash,
        duration: f64,
        text: &str,
        base: &Path,
    ) -> Option<PathBuf> {
        let events = match self.overlay.extract_events(duration, text).await {
            Ok(events) if events.is_empty() => {
                debug!(unit = %id, "no sound events");
                return None;
            }
            Ok(events) => events,
            Err(e) => {
                warn!(unit = %id, error = %e, "event extraction failed, keeping base mix");
                return None;
            }
        };
        let output = self
            .store
            .path_for(&format!("final_fx_{}_{}.ogg", id, hash.short()));
        match self.overlay.overlay(base, &events, &output).await {
            Ok(path) => path,
            Err(e) => {
                warn!(unit = %id, error = %e, "event overlay failed, keeping base mix");
                None
            }
        }
    }

    async fn advance(&self, unit: &mut NarrationUnit, next: UnitStatus) -> Result<()> {
        unit.transition(next)?;
        debug!(unit = %unit.id, status = %next, "unit advanced");
        self.units.save_unit(unit).await
    }

    /// Record the finished unit and its reuse keys. The audio stays in place
    /// even when a write fails.
    async fn persist_completed(
        &self,
        unit: &NarrationUnit,
        hash: &ContentHash,
        final_path: &Path,
    ) -> Result<()> {
        let recorded = async {
            self.units.save_unit(unit).await?;
            let artifact = Artifact {
                unit_id: unit.id.clone(),
                path: final_path.to_path_buf(),
            };
            self.dedup.record_hash(hash, &artifact).await?;
            if let Some(key) = unit.group {
                self.record_range(key, final_path).await?;
            }
            Ok::<(), Error>(())
        };
        recorded.await.map_err(|e| {
            error!(unit = %unit.id, path = ?final_path, error = %e, "completed audio could not be recorded");
            e
        })
    }

    /// Insert-if-absent range record; a group written first by another merge wins.
    async fn record_range(&self, key: GroupKey, path: &Path) -> Result<()> {
        let group = self
            .dedup
            .record_group(ProcessedChunkGroup::new(key, path.to_path_buf()))
            .await?;
        if group.audio_path != path {
            info!(group = %key, kept = ?group.audio_path, "group was recorded by another merge");
        }
        Ok(())
    }

    async fn mark_failed(&self, unit: &mut NarrationUnit, cause: &Error) {
        if unit.status.is_terminal() {
            return;
        }
        error!(unit = %unit.id, status = %unit.status, error = %cause, "merge failed");
        if unit.transition(UnitStatus::Failed).is_ok() {
            if let Err(e) = self.units.save_unit(unit).await {
                error!(unit = %unit.id, error = %e, "could not record failure");
            }
        }
    }
}
