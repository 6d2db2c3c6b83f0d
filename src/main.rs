use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mnbot_worker::{
    AttemptRunner, ChromiumSession, DedupSweeper, JobDescriptor, LogResultStore, SessionPool,
    SqliteDedupStore, WorkerConfig, initialize,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Per-page browse worker: captures pages through an archiving proxy
#[derive(Debug, Parser)]
#[command(name = "mnbot-worker", version, about)]
struct Args {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one attempt for each job file and report the results
    Capture {
        /// Job descriptor files (JSON)
        #[arg(required = true)]
        jobs: Vec<PathBuf>,
    },
    /// Prune old entries from the dedup index once
    Sweep,
    /// Wait for the proxy and create the dedup date index
    Init,
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = WorkerConfig::from_env().context("Invalid configuration")?;

    // Single-threaded scheduler; browser work runs on the worker pool
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    if let Err(err) = runtime.block_on(dispatch(args.command, config)) {
        error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(command: Command, config: WorkerConfig) -> Result<()> {
    let store = Arc::new(
        SqliteDedupStore::connect(config.database_url(), config.dedup_table())
            .await
            .context("Failed to open dedup database")?,
    );

    match command {
        Command::Init => initialize(&config, store.as_ref()).await?,
        Command::Sweep => {
            let sweeper = DedupSweeper::new(Arc::clone(&store), config.dedup_retention());
            if sweeper.sweep().await.is_none() {
                anyhow::bail!("Dedup sweep failed");
            }
        }
        Command::Capture { jobs } => capture(&config, Arc::clone(&store), &jobs).await?,
    }

    store.close().await;
    Ok(())
}

async fn read_job(path: &Path, config: &WorkerConfig) -> Result<JobDescriptor> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read job file {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Job file {} is not JSON", path.display()))?;

    if let Some(fields) = value.as_object_mut() {
        fields
            .entry("info_url")
            .or_insert_with(|| config.info_url().into());
    }
    serde_json::from_value(value)
        .with_context(|| format!("Job file {} is not a job descriptor", path.display()))
}

async fn capture(config: &WorkerConfig, store: Arc<SqliteDedupStore>, paths: &[PathBuf]) -> Result<()> {
    let mut descriptors = Vec::with_capacity(paths.len());
    for path in paths {
        descriptors.push(read_job(path, config).await?);
    }

    initialize(config, store.as_ref()).await?;
    let sweeper = Arc::new(DedupSweeper::new(store, config.dedup_retention()));
    let sweeping = sweeper.start_periodic(config.sweep_interval());

    let handle = tokio::runtime::Handle::current();
    let sessions = SessionPool::new(
        (0..config.browsers())
            .map(|_| ChromiumSession::new(handle.clone(), config))
            .collect(),
    );
    let runner = AttemptRunner::new(config, sessions, LogResultStore);

    let total = descriptors.len();
    let attempts = descriptors.into_iter().map(|descriptor| {
        let runner = &runner;
        async move {
            let job_id = descriptor.id.clone();
            (job_id, runner.run_attempt(descriptor).await)
        }
    });
    let outcomes = futures::future::join_all(attempts).await;
    sweeping.abort();

    let mut failed = 0;
    for (job_id, outcome) in outcomes {
        match outcome {
            Ok((dedup_bucket, stats_bucket)) => {
                info!(%job_id, %dedup_bucket, %stats_bucket, "job succeeded");
            }
            Err(e) => {
                failed += 1;
                error!(%job_id, rejected = e.is_rejection(), "job failed: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} jobs failed");
    }
    Ok(())
}
