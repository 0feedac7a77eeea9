//! task-manager: leader-gated periodic scheduler for table maintenance jobs.
//!
//! Reads table configs from a directory, registers the generators declared in
//! the generators file, and submits a batch per job type every interval. The
//! admin API can trigger a pass on demand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use cairn_core::Config;
use cairn_queue::{InMemoryTaskQueue, SqsTaskQueue, TaskQueueGateway};
use cairn_scheduler::admin::{admin_router, AdminState};
use cairn_scheduler::{
    FileTableDirectory, GeneratorsFile, InMemoryMetrics, PeriodicTaskRunner, StaticLeadership, TaskManager,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Periodic task manager for the cluster controller.
#[derive(Parser, Debug)]
#[command(name = "task-manager", version, about)]
struct Cli {
    /// Seconds between scheduling passes (overrides TASK_MANAGER_FREQUENCY_SECS).
    #[arg(long)]
    frequency_secs: Option<i64>,

    /// Directory of table config files (overrides TABLE_CONFIG_DIR).
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Generators TOML file (overrides GENERATORS_CONFIG).
    #[arg(long)]
    generators: Option<PathBuf>,

    /// Admin API bind address (overrides HOST/PORT).
    #[arg(long, env = "TASK_MANAGER_BIND")]
    bind: Option<String>,

    /// Run a single scheduling pass, print the report as JSON, and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    cairn_core::config::load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(secs) = cli.frequency_secs {
        config.controller.task_manager_frequency_secs = secs;
    }
    if let Some(dir) = cli.tables {
        config.controller.table_config_dir = dir;
    }
    if let Some(path) = cli.generators {
        config.controller.generators_config = Some(path);
    }
    config.log_summary();

    let queue: Arc<dyn TaskQueueGateway> = if config.queue.is_sqs() {
        Arc::new(
            SqsTaskQueue::new(&config.aws, &config.queue)
                .await
                .context("failed to build SQS task queue")?,
        )
    } else {
        Arc::new(InMemoryTaskQueue::new())
    };

    let metrics = Arc::new(InMemoryMetrics::new());
    let manager = Arc::new(TaskManager::new(
        Arc::new(StaticLeadership::new(config.controller.leader)),
        Arc::new(FileTableDirectory::new(&config.controller.table_config_dir)),
        queue,
        metrics.clone(),
    ));

    match &config.controller.generators_config {
        Some(path) => {
            let file = GeneratorsFile::from_file(path)
                .with_context(|| format!("failed to load generators from {}", path.display()))?;
            for generator in file.build(&manager.cluster_info()) {
                manager.register_task_generator(generator)?;
            }
        }
        None => warn!("No generators configured, passes will only count themselves"),
    }
    info!(generators = manager.registry().len(), "Task generators registered");

    if cli.once {
        let report = manager.schedule_tasks_report().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let runner = Arc::new(PeriodicTaskRunner::new(
        manager.clone(),
        config.controller.task_manager_frequency_secs,
    )?);
    let timer = runner.start();

    let state = Arc::new(AdminState {
        manager,
        runner: runner.clone(),
        metrics,
        config: config.redacted_summary(),
    });
    let bind = cli.bind.unwrap_or_else(|| config.server.bind_addr());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind admin API on {bind}"))?;
    info!("Admin API listening on {}", bind);

    axum::serve(listener, admin_router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;

    runner.shutdown();
    timer.await.ok();
    info!("task-manager stopped");
    Ok(())
}
