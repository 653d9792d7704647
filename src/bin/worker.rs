//! Queue worker - drains queued chunk-group merges one at a time.
//!
//! Wires up:
//! - Redis records and job queue
//! - Audio directory on the local filesystem
//! - OpenAI / ElevenLabs collaborators and the ffmpeg compositor

use foley::adapters::local::local_ports;
use foley::application::merge::ChunkMergeService;
use foley::application::orchestrator::MergeOrchestrator;
use foley::application::queue::JobWorker;
use foley::application::resolver::ChunkGroupResolver;
use foley::config::FoleyConfig;
use foley::domain::av::effects::EffectCache;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = FoleyConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Adapters
    let ports = match local_ports(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to set up adapters: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Application services
    let orchestrator = Arc::new(MergeOrchestrator::new(
        &ports,
        Arc::new(EffectCache::new()),
        config.effect_concurrency,
    ));
    let resolver = ChunkGroupResolver::new(
        ports.chunks.clone(),
        ports.store.clone(),
        ports.compositor.clone(),
    );
    let merges = Arc::new(ChunkMergeService::new(
        resolver,
        ports.dedup.clone(),
        orchestrator,
    ));
    let worker = JobWorker::new(ports.queue.clone(), merges, config.queue_poll_interval);

    // 3. Stop polling on ctrl-c; a running job finishes first
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    info!(audio_dir = ?config.audio_dir, "worker ready");
    worker.run(shutdown).await;
}
