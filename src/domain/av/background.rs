//! Stretches one fixed-length music clip into a full-length background track.
//!
//! Every segment becomes a clip that loops the source, starts at
//! `segment.start` (silence before) and stops at `segment.end`. The clips are
//! concatenated losslessly, then a second pass trims and re-encodes the staged
//! track to the narration duration: delayed streams cannot be stream-copied
//! while trimming.

use super::cmd::Compositor;
use super::graph::{millis, render_concat_list, AudioFilter, Codec, Input, Invocation};
use crate::config::PipelineSettings;
use crate::domain::segments::Segment;
use crate::error::{CompositingError, Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A finished background track plus the intermediates left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundTrack {
    pub path: PathBuf,
    pub duration: f64,
    /// Per-segment clips, concat list and staged track
    pub transient: Vec<PathBuf>,
}

pub fn segment_invocation(
    source: &Path,
    segment: &Segment,
    settings: &PipelineSettings,
    output: &Path,
) -> Invocation {
    Invocation::new(output)
        .input(Input::Looped(source.to_path_buf()))
        .limit(segment.start + segment.duration())
        .filter(AudioFilter::Delay {
            millis: millis(segment.start),
        })
        .filter(AudioFilter::Volume(settings.background_volume))
        .codec(Codec::Opus {
            bitrate: settings.bitrate.clone(),
        })
}

pub fn trim_invocation(
    staged: &Path,
    duration: f64,
    settings: &PipelineSettings,
    output: &Path,
) -> Invocation {
    Invocation::new(output)
        .input(Input::File(staged.to_path_buf()))
        .filter(AudioFilter::Trim { duration })
        .codec(Codec::Opus {
            bitrate: settings.bitrate.clone(),
        })
}

pub struct BackgroundSynthesizer<'a> {
    compositor: &'a dyn Compositor,
    settings: &'a PipelineSettings,
    work_dir: &'a Path,
}

impl<'a> BackgroundSynthesizer<'a> {
    pub fn new(
        compositor: &'a dyn Compositor,
        settings: &'a PipelineSettings,
        work_dir: &'a Path,
    ) -> Self {
        Self {
            compositor,
            settings,
            work_dir,
        }
    }

    /// Build a background track of exactly `duration` seconds.
    ///
    /// `tag` prefixes every artifact so concurrent merges never share files.
    /// Any failing step aborts the whole track and removes what was written.
    pub async fn synthesize(
        &self,
        tag: &str,
        source: &Path,
        duration: f64,
        segments: &[Segment],
    ) -> Result<BackgroundTrack> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::validation(format!(
                "background duration must be positive, got {}",
                duration
            )));
        }

        let mut transient = Vec::with_capacity(segments.len() + 2);
        match self
            .build(tag, source, duration, segments, &mut transient)
            .await
        {
            Ok(path) => {
                info!(tag, duration, segments = segments.len(), "background synthesized");
                Ok(BackgroundTrack {
                    path,
                    duration,
                    transient,
                })
            }
            Err(e) => {
                warn!(tag, error = %e, "background synthesis aborted");
                remove_all(&transient).await;
                Err(e)
            }
        }
    }

    async fn build(
        &self,
        tag: &str,
        source: &Path,
        duration: f64,
        segments: &[Segment],
        transient: &mut Vec<PathBuf>,
    ) -> Result<PathBuf> {
        let mut clips = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            if segment.duration() <= 0.0 {
                debug!(tag, index = i, "skipping empty segment");
                continue;
            }
            let out = self.work_dir.join(format!("{}_bg_seg_{}.ogg", tag, i));
            transient.push(out.clone());
            self.compositor
                .run(&segment_invocation(source, segment, self.settings, &out))
                .await?;
            debug!(tag, index = i, mood = %segment.mood, "segment clip written");
            clips.push(out);
        }
        if clips.is_empty() {
            return Err(CompositingError::InvalidGraph("no non-empty segments".into()).into());
        }

        let list = self.work_dir.join(format!("{}_bg_list.txt", tag));
        transient.push(list.clone());
        tokio::fs::write(&list, render_concat_list(&clips)).await?;

        let staged = self.work_dir.join(format!("{}_bg_staged.ogg", tag));
        transient.push(staged.clone());
        let concat = Invocation::new(&staged)
            .input(Input::ConcatList {
                list,
                entries: clips,
            })
            .codec(Codec::Copy);
        self.compositor.run(&concat).await?;

        let finished = self.work_dir.join(format!("{}_bg_final.ogg", tag));
        self.compositor
            .run(&trim_invocation(&staged, duration, self.settings, &finished))
            .await?;
        Ok(finished)
    }
}

/// Best-effort removal of intermediate files.
pub async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(?path, error = %e, "could not remove transient file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::av::cmd::MockCompositor;
    use crate::domain::segments::{fallback_segments, Mood};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn seg(start: f64, end: f64) -> Segment {
        Segment {
            start,
            end,
            mood: Mood::Neutral,
        }
    }

    #[test]
    fn test_segment_clip_is_delayed_and_truncated() {
        let settings = PipelineSettings::default();
        let inv = segment_invocation(
            Path::new("clip.mp3"),
            &seg(22.0, 40.0),
            &settings,
            Path::new("out.ogg"),
        );
        assert_eq!(inv.max_duration, Some(40.0));
        assert_eq!(
            inv.audio_filters,
            vec![
                AudioFilter::Delay { millis: 22000 },
                AudioFilter::Volume(0.30)
            ]
        );
        assert!(matches!(inv.inputs[0], Input::Looped(_)));
    }

    #[tokio::test]
    async fn test_synthesize_runs_segments_then_concat_then_trim() {
        let dir = tempdir().unwrap();
        let settings = PipelineSettings::default();
        let seen: Arc<Mutex<Vec<Invocation>>> = Arc::new(Mutex::new(Vec::new()));

        let mut compositor = MockCompositor::new();
        let record = seen.clone();
        compositor.expect_run().times(5).returning(move |inv| {
            record.lock().unwrap().push(inv.clone());
            Ok(())
        });

        let segments = fallback_segments(46.0, 22.0).unwrap();
        let synth = BackgroundSynthesizer::new(&compositor, &settings, dir.path());
        let track = synth
            .synthesize("unit", Path::new("clip.mp3"), 46.0, &segments)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen[..3].iter().all(|i| matches!(i.inputs[0], Input::Looped(_))));
        match &seen[3].inputs[0] {
            Input::ConcatList { entries, .. } => assert_eq!(entries.len(), 3),
            other => panic!("expected concat, got {:?}", other),
        }
        assert_eq!(seen[3].codec, Some(Codec::Copy));
        assert_eq!(
            seen[4].audio_filters,
            vec![AudioFilter::Trim { duration: 46.0 }]
        );
        assert_eq!(track.path, seen[4].output);
        assert_eq!(track.duration, 46.0);
        assert_eq!(track.transient.len(), 5);

        let list = std::fs::read_to_string(dir.path().join("unit_bg_list.txt")).unwrap();
        assert_eq!(list.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_segment_failure_aborts_without_partial_track() {
        let dir = tempdir().unwrap();
        let settings = PipelineSettings::default();

        let mut compositor = MockCompositor::new();
        let mut calls = 0;
        compositor.expect_run().returning(move |_| {
            calls += 1;
            if calls == 2 {
                Err(CompositingError::Failed {
                    program: "ffmpeg",
                    status: "exit status: 1".into(),
                    stderr: "boom".into(),
                })
            } else {
                Ok(())
            }
        });

        let synth = BackgroundSynthesizer::new(&compositor, &settings, dir.path());
        let result = synth
            .synthesize(
                "unit",
                Path::new("clip.mp3"),
                60.0,
                &[seg(0.0, 22.0), seg(22.0, 44.0), seg(44.0, 60.0)],
            )
            .await;
        assert!(matches!(result, Err(Error::Compositing(_))));
        assert!(!dir.path().join("unit_bg_list.txt").exists());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_duration() {
        let dir = tempdir().unwrap();
        let settings = PipelineSettings::default();
        let compositor = MockCompositor::new();
        let synth = BackgroundSynthesizer::new(&compositor, &settings, dir.path());
        let result = synth
            .synthesize("unit", Path::new("clip.mp3"), 0.0, &[seg(0.0, 1.0)])
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
