//! Hive CLI - worker-side tools for a hive pipeline database.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hive_core::{cmdline, paths, AnalysisId, BackendKey, NewWorker, ResourceUsage, WorkerStatus};
use hive_runnable::{JobContext, JobError, RunnableRegistry};
use hive_storage::{record_usage_best_effort, Ledger, MigrationOutcome, SqliteLedger};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::HiveConfig;

#[derive(Parser)]
#[command(name = "hive")]
#[command(about = "Worker-side tools for a hive pipeline database", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger database URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Root directory for worker logs
    #[arg(long, global = true)]
    log_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the ledger schema up to date
    Migrate,
    /// Show resource usage per analysis and backend
    Stats,
    /// Show where artifacts for an id are placed
    Shard {
        /// Worker (or other) id
        id: String,
    },
    /// List the registered runnables
    Runnables,
    /// Run one job as a local worker
    Run {
        /// Runnable name
        runnable: String,
        /// Job payload: encoded parameters or a plain command
        #[arg(default_value = "")]
        payload: String,
        /// Analysis the worker belongs to
        #[arg(long)]
        analysis_id: Option<i64>,
        /// Extra job parameters as `--name=value` tokens
        #[arg(last = true)]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = HiveConfig::load(cli.config.as_deref())?.with_env();
    if let Some(url) = cli.database_url {
        config.ledger.database_url = url;
    }
    if let Some(root) = cli.log_root {
        config.log_root = root;
    }

    match cli.command {
        Commands::Migrate => {
            let ledger = SqliteLedger::open(&config.ledger).await?;
            match ledger.migrate().await? {
                MigrationOutcome::Applied => println!("Migrated ledger to version {}", ledger.schema_version().await?),
                MigrationOutcome::AlreadyApplied => println!("Ledger already at version {}", ledger.schema_version().await?),
            }
        }
        Commands::Stats => {
            let ledger = open_ledger(&config).await?;
            let stats = ledger.aggregated_stats().await?;

            println!("Resource usage ({} groups)", stats.len());
            for row in stats {
                println!(
                    "  {} | {} | {} | workers {} | mem {} / {} / {} | swap {} / {} / {}",
                    row.analysis,
                    row.backend_type.as_deref().unwrap_or("-"),
                    row.resource_class,
                    row.workers,
                    format_megs(row.min_mem_megs),
                    format_megs(row.avg_mem_megs),
                    format_megs(row.max_mem_megs),
                    format_megs(row.min_swap_megs),
                    format_megs(row.avg_swap_megs),
                    format_megs(row.max_swap_megs),
                );
            }
        }
        Commands::Shard { id } => {
            println!("Shard:   {}", paths::shard_path(&id).display());
            println!("Log dir: {}", paths::worker_log_dir(&config.log_root, &id).display());
        }
        Commands::Runnables => {
            for name in RunnableRegistry::with_builtins().names() {
                println!("{}", name);
            }
        }
        Commands::Run {
            runnable,
            payload,
            analysis_id,
            params,
        } => {
            let ledger = open_ledger(&config).await?;
            let registry = RunnableRegistry::with_builtins();

            if let Err(e) = run_job(&config, &ledger, &registry, &runnable, payload, analysis_id, &params).await {
                error!("{:#}", e);
                let code = e
                    .downcast_ref::<JobError>()
                    .and_then(JobError::exit_code)
                    .and_then(|code| u8::try_from(code).ok())
                    .filter(|code| *code != 0)
                    .unwrap_or(1);
                return Ok(ExitCode::from(code));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Open the ledger and bring its schema up to date.
async fn open_ledger(config: &HiveConfig) -> Result<SqliteLedger> {
    let ledger = SqliteLedger::open(&config.ledger)
        .await
        .with_context(|| format!("Failed to open ledger {}", config.ledger.database_url))?;
    ledger.migrate().await?;
    Ok(ledger)
}

/// Register a local worker, run one job in it and record what it used.
async fn run_job(
    config: &HiveConfig,
    ledger: &SqliteLedger,
    registry: &RunnableRegistry,
    runnable: &str,
    payload: String,
    analysis_id: Option<i64>,
    tokens: &[String],
) -> Result<()> {
    let runnable = registry.create(runnable)?;
    let (params, positional) = cmdline::parse_params(tokens)?;
    if !positional.is_empty() {
        warn!("Ignoring positional arguments: {:?}", positional);
    }

    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let worker = ledger
        .create_worker(&NewWorker {
            analysis_id: analysis_id.map(AnalysisId),
            backend: BackendKey::new("LOCAL", host, std::process::id().to_string()),
        })
        .await?;

    let log_dir = paths::worker_log_dir(&config.log_root, worker.id);
    tokio::fs::create_dir_all(&log_dir)
        .await
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    ledger.set_worker_log_dir(worker.id, &log_dir.to_string_lossy()).await?;
    ledger.set_worker_status(worker.id, WorkerStatus::Busy).await?;
    info!("Worker {} running {} (logs in {})", worker.id, runnable.name(), log_dir.display());

    let started = Instant::now();
    let mut ctx = JobContext::new(payload).with_params(params);
    let outcome = runnable.life_cycle(&mut ctx).await;

    let exit_status = match &outcome {
        Ok(()) => "done".to_string(),
        Err(e) => match e.exit_code() {
            Some(code) => format!("exit/{}", code),
            None => "failed".to_string(),
        },
    };
    let usage = ResourceUsage {
        exit_status: Some(exit_status),
        lifespan_sec: Some(started.elapsed().as_secs_f64()),
        ..Default::default()
    };

    // Teardown goes on whatever the ledger says.
    record_usage_best_effort(ledger, worker.id, &usage).await;
    if let Err(e) = ledger.set_worker_status(worker.id, WorkerStatus::Dead).await {
        warn!("Could not mark worker {} dead: {}", worker.id, e);
    }

    outcome?;
    info!("Worker {} finished", worker.id);
    Ok(())
}

fn format_megs(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}
