//! One-shot command line front end.
//!
//! ```text
//! merge <book_id> <chunk_id>...          merge a chunk group now
//! merge --queue <book_id> <chunk_id>...  queue it for the worker
//! merge --status <job_id>                show a queued job
//! merge --narrate <book_id> <page>...    narrate one or two pages, then merge
//! ```

use foley::adapters::local::local_ports;
use foley::application::dispatcher::MergeDispatcher;
use foley::application::merge::ChunkMergeService;
use foley::application::narration::NarrationService;
use foley::application::orchestrator::MergeOrchestrator;
use foley::application::queue::{GroupMerger, JobQueueService, Submission};
use foley::application::resolver::ChunkGroupResolver;
use foley::application::Ports;
use foley::config::FoleyConfig;
use foley::domain::av::effects::EffectCache;
use foley::error::{Error, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const USAGE: &str = "usage: merge [--queue | --narrate] <book_id> <id>... | merge --status <job_id>";

enum Command {
    Merge(u64, Vec<u64>),
    Queue(u64, Vec<u64>),
    Status(Uuid),
    Narrate(u64, Vec<u32>),
}

fn number<T: std::str::FromStr>(arg: &str) -> Result<T> {
    arg.parse()
        .map_err(|_| Error::validation(format!("not a number: {}", arg)))
}

fn book_and_ids<T: std::str::FromStr>(args: &[String]) -> Result<(u64, Vec<T>)> {
    let (book, ids) = args
        .split_first()
        .ok_or_else(|| Error::validation(USAGE))?;
    let ids = ids.iter().map(|a| number(a)).collect::<Result<Vec<T>>>()?;
    Ok((number(book)?, ids))
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        Some("--queue") => {
            let (book, ids) = book_and_ids(&args[1..])?;
            Ok(Command::Queue(book, ids))
        }
        Some("--narrate") => {
            let (book, pages) = book_and_ids(&args[1..])?;
            Ok(Command::Narrate(book, pages))
        }
        Some("--status") => {
            let id = args.get(1).ok_or_else(|| Error::validation(USAGE))?;
            let id = Uuid::parse_str(id).map_err(|e| Error::validation(e.to_string()))?;
            Ok(Command::Status(id))
        }
        Some(_) => {
            let (book, ids) = book_and_ids(args)?;
            Ok(Command::Merge(book, ids))
        }
        None => Err(Error::validation(USAGE)),
    }
}

fn merge_service(ports: &Ports, orchestrator: Arc<MergeOrchestrator>) -> Arc<ChunkMergeService> {
    let resolver = ChunkGroupResolver::new(
        ports.chunks.clone(),
        ports.store.clone(),
        ports.compositor.clone(),
    );
    Arc::new(ChunkMergeService::new(resolver, ports.dedup.clone(), orchestrator))
}

async fn run(command: Command, config: &FoleyConfig, ports: Ports) -> Result<()> {
    let orchestrator = Arc::new(MergeOrchestrator::new(
        &ports,
        Arc::new(EffectCache::new()),
        config.effect_concurrency,
    ));
    let queue = JobQueueService::new(
        ports.queue.clone(),
        ports.chunks.clone(),
        ports.dedup.clone(),
        ports.settings.clone(),
    );

    match command {
        Command::Merge(book, ids) => {
            let path = merge_service(&ports, orchestrator)
                .merge_group(book, &ids)
                .await?;
            println!("{}", path.display());
        }
        Command::Queue(book, ids) => match queue.submit(book, ids).await? {
            Submission::AlreadyAvailable(path) => println!("available: {}", path.display()),
            Submission::Queued(job) => println!("queued: {}", job.id),
        },
        Command::Status(id) => {
            let job = queue.status(id).await?;
            println!("{} {} {:?}", job.id, job.status.as_str(), job.chunk_ids);
        }
        Command::Narrate(book, pages) => {
            let dispatcher = Arc::new(MergeDispatcher::new(
                orchestrator.clone(),
                config.max_concurrent_merges,
            ));
            let narration = NarrationService::new(
                ports.chunks.clone(),
                ports.store.clone(),
                ports.narrator.clone(),
                merge_service(&ports, orchestrator),
                dispatcher.clone(),
            );
            let report = narration.narrate_pages(book, &pages).await?;
            for path in &report.audio_paths {
                println!("narrated: {}", path.display());
            }
            if !report.failed.is_empty() {
                println!("failed chunks: {:?}", report.failed);
            }
            if let Some(path) = report.existing {
                println!("available: {}", path.display());
            }
            if let Some(handle) = report.merge {
                // ctrl-c abandons the merge; the unit is recorded as failed
                let stop = dispatcher.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        stop.shutdown();
                    }
                });
                let outcome = handle.join().await?;
                println!("merged: {}", outcome.final_path.display());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let config = FoleyConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let ports = match local_ports(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to set up adapters: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(command, &config, ports).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
