//! Builds the production `Ports` for a local deployment: Redis records,
//! artifacts on disk, OpenAI and ElevenLabs collaborators, ffmpeg.

use super::{FsAdapter, RedisPool};
use crate::adapters::http::{ElevenLabsClient, OpenAiClient};
use crate::application::Ports;
use crate::config::FoleyConfig;
use crate::domain::av::cmd::FfmpegCompositor;
use crate::error::{Error, Result};
use std::sync::Arc;

pub fn local_ports(config: &FoleyConfig) -> Result<Ports> {
    let openai_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| Error::validation("OPENAI_API_KEY is not set"))?;
    let xi_key = config
        .xi_api_key
        .clone()
        .ok_or_else(|| Error::validation("XI_API_KEY is not set"))?;

    let redis = RedisPool::new(&config.redis_url)?;
    let analyzer = OpenAiClient::new(
        openai_key,
        config.openai_model.clone(),
        config.openai_url.clone(),
        config.request_timeout,
    )?;
    let elevenlabs = Arc::new(ElevenLabsClient::new(
        xi_key,
        config.elevenlabs_voice_id.clone(),
        config.elevenlabs_url.clone(),
        config.request_timeout,
    )?);

    Ok(Ports {
        chunks: Arc::new(redis.clone()),
        units: Arc::new(redis.clone()),
        dedup: Arc::new(redis.clone()),
        queue: Arc::new(redis),
        store: Arc::new(FsAdapter::new(&config.audio_dir)),
        analyzer: Arc::new(analyzer),
        clips: elevenlabs.clone(),
        narrator: elevenlabs,
        compositor: Arc::new(FfmpegCompositor::new(config.compositor_timeout)),
        settings: config.pipeline.clone(),
    })
}
