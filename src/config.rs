//! Configuration for the pipeline and its deployment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Audio constants shared by the synthesizers and the orchestrator.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Length of one generated background music clip, in seconds
    pub source_clip_seconds: f64,
    /// Length requested for one Foley clip, in seconds
    pub effect_clip_seconds: f64,
    /// Volume applied to each stretched background segment
    pub background_volume: f64,
    /// Volume applied to the background track when mixed under the narration
    pub base_mix_background_volume: f64,
    /// Volume applied to each Foley occurrence
    pub overlay_volume: f64,
    /// Output bitrate for re-encoded tracks (libopus)
    pub bitrate: String,
    pub base_mix_dropout_transition: f64,
    pub overlay_dropout_transition: f64,
    /// Characters of source text sent for segmentation
    pub segment_excerpt_chars: usize,
    /// Characters of source text sent for event extraction
    pub event_excerpt_chars: usize,
    /// Upper bound on combined text size of a queued request, in bytes
    pub max_queued_text_bytes: usize,
    /// Upper bound on chunk ids in one queued request
    pub max_queued_chunks: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source_clip_seconds: 22.0,
            effect_clip_seconds: 2.0,
            background_volume: 0.30,
            base_mix_background_volume: 0.30,
            overlay_volume: 0.45,
            bitrate: String::from("64k"),
            base_mix_dropout_transition: 2.0,
            overlay_dropout_transition: 0.0,
            segment_excerpt_chars: 200,
            event_excerpt_chars: 500,
            max_queued_text_bytes: 2000,
            max_queued_chunks: 10,
        }
    }
}

/// Configuration for a local deployment (workers + Redis + filesystem).
#[derive(Clone, Debug)]
pub struct FoleyConfig {
    /// Directory holding narration, intermediate and final audio
    pub audio_dir: PathBuf,
    /// Redis connection URL
    pub redis_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_url: String,
    pub xi_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub elevenlabs_url: String,
    /// Bound on every collaborator HTTP call
    pub request_timeout: Duration,
    /// Bound on every compositing engine invocation
    pub compositor_timeout: Duration,
    /// Sleep between queue polls when no job is queued
    pub queue_poll_interval: Duration,
    /// Concurrent interactive merges
    pub max_concurrent_merges: usize,
    /// Concurrent effect generations within one overlay
    pub effect_concurrency: usize,
    pub pipeline: PipelineSettings,
}

impl FoleyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            audio_dir: PathBuf::from(
                env::var("AUDIO_DIR").unwrap_or_else(|_| String::from("./audio")),
            ),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| String::from("redis://127.0.0.1/")),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| String::from("gpt-4o")),
            openai_url: env::var("OPENAI_URL").unwrap_or_else(|_| {
                String::from("https://api.openai.com/v1/chat/completions")
            }),
            xi_api_key: env::var("XI_API_KEY").ok().filter(|k| !k.is_empty()),
            elevenlabs_voice_id: env::var("ELEVENLABS_VOICE_ID")
                .ok()
                .filter(|v| !v.is_empty()),
            elevenlabs_url: env::var("ELEVENLABS_URL")
                .unwrap_or_else(|_| String::from("https://api.elevenlabs.io/v1")),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", 30)),
            compositor_timeout: Duration::from_secs(env_or("COMPOSITOR_TIMEOUT_SECS", 60)),
            queue_poll_interval: Duration::from_secs(env_or("QUEUE_POLL_SECS", 5)),
            max_concurrent_merges: env_or("MAX_CONCURRENT_MERGES", 4),
            effect_concurrency: env_or("EFFECT_CONCURRENCY", 2),
            pipeline: PipelineSettings::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("FOLEY_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("FOLEY_TEST_GARBAGE", 7u64), 7);
        env::set_var("FOLEY_TEST_NUMBER", " 12 ");
        assert_eq!(env_or("FOLEY_TEST_NUMBER", 7u64), 12);
    }

    #[test]
    fn test_default_pipeline_constants() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.source_clip_seconds, 22.0);
        assert_eq!(settings.bitrate, "64k");
        assert!(settings.overlay_volume > settings.background_volume);
    }
}
