use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Language-model analysis of narration text.
///
/// Plan and event methods return the raw model output; parsing and
/// validation happen in `domain::model_output`.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// Prompt describing background music that fits `text`
    async fn style_prompt(&self, text: &str) -> Result<String>;

    /// Ask for exactly `count` mood segments covering `duration` seconds
    async fn segment_plan(&self, duration: f64, excerpt: &str, count: usize) -> Result<String>;

    /// Ask for a map of event type to timestamps within `duration`
    async fn sound_events(&self, duration: f64, excerpt: &str) -> Result<String>;
}

/// Music and sound-effect generation.
#[async_trait]
pub trait ClipGenerator: Send + Sync {
    /// One audio clip of about `duration` seconds for `prompt`
    async fn generate(&self, prompt: &str, duration: f64) -> Result<Bytes>;
}

/// Text-to-speech for narration.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes>;
}
