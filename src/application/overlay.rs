//! Best-effort Foley stage: extract sound events, resolve one clip per event
//! type, and mix every occurrence over the base track.

use crate::config::PipelineSettings;
use crate::domain::av::cmd::Compositor;
use crate::domain::av::effects::EffectCache;
use crate::domain::av::overlay::{effect_prompt, overlay_invocation, Placement};
use crate::domain::model_output::parse_event_map;
use crate::domain::segments::{excerpt, EventMap};
use crate::error::{Error, Result};
use crate::ports::collaborators::{ClipGenerator, TextAnalyzer};
use crate::ports::storage::ArtifactStore;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct EventOverlayEngine {
    analyzer: Arc<dyn TextAnalyzer>,
    clips: Arc<dyn ClipGenerator>,
    compositor: Arc<dyn Compositor>,
    store: Arc<dyn ArtifactStore>,
    cache: Arc<EffectCache>,
    settings: PipelineSettings,
    concurrency: usize,
}

impl EventOverlayEngine {
    pub fn new(
        analyzer: Arc<dyn TextAnalyzer>,
        clips: Arc<dyn ClipGenerator>,
        compositor: Arc<dyn Compositor>,
        store: Arc<dyn ArtifactStore>,
        cache: Arc<EffectCache>,
        settings: PipelineSettings,
        concurrency: usize,
    ) -> Self {
        Self {
            analyzer,
            clips,
            compositor,
            store,
            cache,
            settings,
            concurrency: concurrency.max(1),
        }
    }

    /// Sound events in `text`, with timestamps inside `[0, duration)`.
    pub async fn extract_events(&self, duration: f64, text: &str) -> Result<EventMap> {
        let excerpt = excerpt(text, self.settings.event_excerpt_chars);
        let raw = self.analyzer.sound_events(duration, &excerpt).await?;
        parse_event_map(&raw, duration)
            .map_err(|e| Error::external("text analysis", format!("event map rejected: {}", e)))
    }

    /// Cached clip for `event_type`, generated on first use.
    pub async fn effect_clip(&self, event_type: &str) -> Result<PathBuf> {
        self.cache
            .get_or_generate(event_type, || async {
                let prompt = effect_prompt(event_type);
                let audio = self
                    .clips
                    .generate(&prompt, self.settings.effect_clip_seconds)
                    .await?;
                let path = self
                    .store
                    .write(&format!("effect_{}.mp3", event_type), &audio)
                    .await?;
                info!(event_type, ?path, "effect clip generated");
                Ok(path)
            })
            .await
    }

    async fn placement(&self, event_type: &str, timestamps: &[f64]) -> Option<Placement> {
        match self.effect_clip(event_type).await {
            Ok(clip) => Some(Placement {
                event_type: event_type.to_string(),
                clip,
                timestamps: timestamps.to_vec(),
            }),
            Err(e) => {
                warn!(event_type, error = %e, "skipping event type");
                None
            }
        }
    }

    /// Mix every event occurrence over `base` into `output`.
    ///
    /// Event types whose clip cannot be produced are skipped. Returns
    /// `Ok(None)` when nothing was left to place; a failing mix is an error.
    pub async fn overlay(
        &self,
        base: &Path,
        events: &EventMap,
        output: &Path,
    ) -> Result<Option<PathBuf>> {
        // futures are built up front so the stream borrows nothing per item
        let pending: Vec<_> = events
            .iter()
            .map(|(event_type, timestamps)| self.placement(event_type, timestamps))
            .collect();
        let placements: Vec<Placement> = stream::iter(pending)
            .buffered(self.concurrency)
            .filter_map(|placement| async move { placement })
            .collect()
            .await;

        let Some(invocation) = overlay_invocation(base, &placements, &self.settings, output)
        else {
            debug!("no event occurrences to place");
            return Ok(None);
        };
        self.compositor.run(&invocation).await?;
        info!(
            types = placements.len(),
            occurrences = placements.iter().map(|p| p.timestamps.len()).sum::<usize>(),
            "events overlaid"
        );
        Ok(Some(output.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::FsAdapter;
    use crate::domain::av::cmd::MockCompositor;
    use crate::error::CompositingError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Events(&'static str);

    #[async_trait]
    impl TextAnalyzer for Events {
        async fn style_prompt(&self, _text: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn segment_plan(&self, _d: f64, _e: &str, _n: usize) -> Result<String> {
            Ok(String::new())
        }
        async fn sound_events(&self, _d: f64, _e: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Fails for prompts mentioning "thunder".
    #[derive(Default)]
    struct Clips {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClipGenerator for Clips {
        async fn generate(&self, prompt: &str, _duration: f64) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("thunder") {
                return Err(Error::external("elevenlabs", "returned 429"));
            }
            Ok(Bytes::from_static(b"fx"))
        }
    }

    fn engine(
        reply: &'static str,
        clips: Arc<Clips>,
        compositor: MockCompositor,
        root: &Path,
    ) -> EventOverlayEngine {
        EventOverlayEngine::new(
            Arc::new(Events(reply)),
            clips,
            Arc::new(compositor),
            Arc::new(FsAdapter::new(root)),
            Arc::new(EffectCache::new()),
            PipelineSettings::default(),
            2,
        )
    }

    #[tokio::test]
    async fn test_extract_drops_out_of_range_timestamps() {
        let dir = tempdir().unwrap();
        let e = engine(
            "```json\n{\"Sword Clash\": [1.5, 99], \"door_creak\": [-1]}\n```",
            Arc::new(Clips::default()),
            MockCompositor::new(),
            dir.path(),
        );
        let events = e.extract_events(30.0, "text").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events["sword_clash"], vec![1.5]);
    }

    #[tokio::test]
    async fn test_failed_type_is_skipped_and_others_mixed() {
        let dir = tempdir().unwrap();
        let clips = Arc::new(Clips::default());
        let mut compositor = MockCompositor::new();
        compositor.expect_run().times(1).returning(|inv| {
            // base + door_creak only
            assert_eq!(inv.inputs.len(), 2);
            Ok(())
        });
        let e = engine("{}", clips.clone(), compositor, dir.path());

        let mut events = EventMap::new();
        events.insert("door_creak".into(), vec![1.0, 4.0]);
        events.insert("thunder".into(), vec![2.0]);
        let out = dir.path().join("fx.ogg");
        let result = e.overlay(Path::new("base.ogg"), &events, &out).await.unwrap();

        assert_eq!(result, Some(out));
        assert_eq!(clips.calls.load(Ordering::SeqCst), 2);
        assert!(dir.path().join("effect_door_creak.mp3").exists());
    }

    #[tokio::test]
    async fn test_effect_generated_once_per_process() {
        let dir = tempdir().unwrap();
        let clips = Arc::new(Clips::default());
        let mut compositor = MockCompositor::new();
        compositor.expect_run().times(2).returning(|_| Ok(()));
        let e = engine("{}", clips.clone(), compositor, dir.path());

        let mut events = EventMap::new();
        events.insert("sword_clash".into(), vec![3.0]);
        for _ in 0..2 {
            e.overlay(Path::new("base.ogg"), &events, &dir.path().join("fx.ogg"))
                .await
                .unwrap();
        }
        assert_eq!(clips.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nothing_placed_when_every_type_fails() {
        let dir = tempdir().unwrap();
        let e = engine(
            "{}",
            Arc::new(Clips::default()),
            MockCompositor::new(),
            dir.path(),
        );
        let mut events = EventMap::new();
        events.insert("thunder".into(), vec![2.0]);
        let result = e
            .overlay(Path::new("base.ogg"), &events, &dir.path().join("fx.ogg"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_mix_failure_is_error() {
        let dir = tempdir().unwrap();
        let mut compositor = MockCompositor::new();
        compositor.expect_run().returning(|_| {
            Err(CompositingError::Failed {
                program: "ffmpeg",
                status: "exit status: 1".into(),
                stderr: "Invalid argument".into(),
            })
        });
        let e = engine("{}", Arc::new(Clips::default()), compositor, dir.path());
        let mut events = EventMap::new();
        events.insert("door_creak".into(), vec![2.0]);
        let result = e
            .overlay(Path::new("base.ogg"), &events, &dir.path().join("fx.ogg"))
            .await;
        assert!(matches!(result, Err(Error::Compositing(_))));
    }

    #[tokio::test]
    async fn test_overlay_runs_on_spawned_task() {
        let dir = tempdir().unwrap();
        let mut compositor = MockCompositor::new();
        compositor.expect_run().times(1).returning(|_| Ok(()));
        let e = Arc::new(engine(
            "{}",
            Arc::new(Clips::default()),
            compositor,
            dir.path(),
        ));
        let mut events = EventMap::new();
        events.insert("door_creak".into(), vec![1.0]);
        events.insert("sword_clash".into(), vec![2.0, 6.0]);
        let out = dir.path().join("fx.ogg");

        let task = tokio::spawn({
            let e = e.clone();
            let out = out.clone();
            async move { e.overlay(Path::new("base.ogg"), &events, &out).await }
        });
        assert_eq!(task.await.unwrap().unwrap(), Some(out));
    }
}
