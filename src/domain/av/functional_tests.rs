//! Runs the real engine on generated tones. Skipped when ffmpeg, ffprobe or
//! the required encoders are not installed.

use super::background::BackgroundSynthesizer;
use super::cmd::{Compositor, FfmpegCompositor};
use super::mix::base_mix_invocation;
use crate::config::PipelineSettings;
use crate::domain::segments::fallback_segments;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tempfile::tempdir;

fn engine_available() -> bool {
    let probe_ok = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    let encoders = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
        .unwrap_or_default();
    probe_ok && encoders.contains("libopus") && encoders.contains("libmp3lame")
}

fn tone(path: &Path, frequency: u32, seconds: f64) {
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(format!("sine=frequency={}:duration={}", frequency, seconds))
        .args(["-c:a", "libmp3lame", "-b:a", "64k"])
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_background_track_matches_narration_length() {
    if !engine_available() {
        eprintln!("ffmpeg with libopus/libmp3lame not found, skipping");
        return;
    }
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.mp3");
    let narration = dir.path().join("narration.mp3");
    tone(&source, 220, 4.0);
    tone(&narration, 440, 10.0);

    let compositor = FfmpegCompositor::new(Duration::from_secs(60));
    let settings = PipelineSettings {
        source_clip_seconds: 4.0,
        ..PipelineSettings::default()
    };
    let duration = compositor.probe_duration(&narration).await.unwrap();
    assert!((duration - 10.0).abs() < 0.1, "narration lasts {}", duration);

    let segments = fallback_segments(duration, settings.source_clip_seconds).unwrap();
    let synthesizer = BackgroundSynthesizer::new(&compositor, &settings, dir.path());
    let track = synthesizer
        .synthesize("tone", &source, duration, &segments)
        .await
        .unwrap();
    let produced = compositor.probe_duration(&track.path).await.unwrap();
    assert!(
        (produced - duration).abs() < 0.1,
        "background lasts {}, narration {}",
        produced,
        duration
    );

    let merged = dir.path().join("merged.ogg");
    compositor
        .run(&base_mix_invocation(&narration, &track.path, &settings, &merged))
        .await
        .unwrap();
    let mixed = compositor.probe_duration(&merged).await.unwrap();
    assert!((mixed - duration).abs() < 0.1, "base mix lasts {}", mixed);
}
