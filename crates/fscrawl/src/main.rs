//! fscrawl daemon: crawls configured document trees into the indexing
//! backend until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use filestore::{FileStore, FtpFileStore, LocalFileStore, SshFileStore};
use fscrawl::config::{Protocol, ServerConfig};
use fscrawl::elasticsearch::default_mapping;
use fscrawl::{
    BulkBuffer, CrawlWorker, CrawlerError, ElasticsearchClient, JobStateStore, PlainTextExtractor,
    ScanScheduler, Settings,
};

#[derive(Debug, Parser)]
#[command(name = "fscrawl", about = "Crawl file trees into an indexing backend")]
struct Args {
    /// Job settings files (JSON), one job each.
    #[arg(long = "config", required = true, num_args = 1..)]
    configs: Vec<PathBuf>,

    /// Directory holding per-job snapshots. Defaults to ~/.fscrawl.
    #[arg(long)]
    metadata_dir: Option<PathBuf>,

    /// Run a single scan cycle per job and exit.
    #[arg(long)]
    once: bool,
}

fn metadata_dir(args: &Args) -> PathBuf {
    if let Some(dir) = &args.metadata_dir {
        return dir.clone();
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fscrawl")
}

fn build_store(server: &ServerConfig) -> Result<Box<dyn FileStore>, CrawlerError> {
    match server.protocol {
        Protocol::Local => Ok(Box::new(LocalFileStore::new())),
        Protocol::Ftp => Ok(Box::new(FtpFileStore::new(
            &server.hostname,
            server.port(),
            server.username.as_deref().unwrap_or("anonymous"),
            server.password.as_deref().unwrap_or(""),
        ))),
        Protocol::Ssh => {
            let username = server.username.as_deref().ok_or_else(|| {
                CrawlerError::Config("server.username is required for ssh".to_string())
            })?;
            Ok(Box::new(SshFileStore::new(
                &server.hostname,
                server.port(),
                username,
                server.password.as_deref(),
                server.pem_path.as_deref(),
            )))
        }
    }
}

struct Job {
    scheduler: ScanScheduler,
    buffer: Arc<BulkBuffer<ElasticsearchClient>>,
}

fn build_worker(
    settings: &Settings,
    state_store: &JobStateStore,
    buffer: Arc<BulkBuffer<ElasticsearchClient>>,
) -> Result<CrawlWorker, CrawlerError> {
    CrawlWorker::new(
        settings.clone(),
        build_store(&settings.server)?,
        state_store.clone(),
        buffer,
        Arc::new(PlainTextExtractor::new()),
    )
}

/// Prepares the backend index. Failure is logged, not fatal: the backend
/// may simply not be up yet, and bulk flushes surface their own errors.
fn prepare_index(client: &ElasticsearchClient, index: &str) {
    if let Err(error) = client.create_index(index) {
        tracing::warn!(index, %error, "index creation failed");
        return;
    }
    if let Err(error) = client.put_mapping(index, &default_mapping()) {
        tracing::warn!(index, %error, "mapping installation failed");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CrawlerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let state_store = JobStateStore::new(&metadata_dir(&args))?;

    let mut jobs = Vec::new();
    for path in &args.configs {
        let settings = Settings::load(path)?;
        let index = settings.index().to_string();
        tracing::info!(job = %settings.name, index = %index, url = %settings.fs.url, "starting job");

        let client = ElasticsearchClient::new(&settings.elasticsearch)?;
        prepare_index(&client, &index);

        let buffer = Arc::new(BulkBuffer::new(
            client,
            settings.elasticsearch.bulk_size,
            settings.elasticsearch.flush_interval(),
        ));

        let worker = build_worker(&settings, &state_store, buffer.clone())?;
        if args.once {
            let mut worker = worker;
            match worker.run_cycle() {
                Ok(stats) => tracing::info!(job = %settings.name, ?stats, "cycle finished"),
                Err(error) => tracing::warn!(job = %settings.name, %error, "cycle failed"),
            }
            buffer.close();
            continue;
        }

        jobs.push(Job {
            scheduler: ScanScheduler::spawn(worker, settings.update_rate()),
            buffer,
        });
    }

    if args.once || jobs.is_empty() {
        return Ok(());
    }

    tracing::info!(jobs = jobs.len(), "crawling; press ctrl-c to stop");
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "signal handler failed, shutting down");
    }

    for job in &mut jobs {
        tracing::info!(job = job.scheduler.job_name(), "stopping");
        job.scheduler.stop();
        job.buffer.close();
    }
    Ok(())
}
