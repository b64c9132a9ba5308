//! Trellis - workflow orchestration core.
//!
//! Main entry point for the trellis CLI and server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trellis_api::{ApiConfig, ApiServer, AppState, StaticConnections};
use trellis_engine::{
    ExecutionEngine, FileRunStore, FileWorkflowStore, HttpStepInvoker, MemoryRunStore,
    MemoryWorkflowStore, MockStepInvoker, RunLedger, Scheduler,
};
use trellis_notify::NotifierHub;
use trellis_protocols::invoker::StepInvoker;
use trellis_protocols::store::{RunStore, WorkflowStore};

/// Trellis CLI.
#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Workflow orchestration core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration server (default)
    Serve {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Storage directory for workflows and run history.
        /// In-memory stores are used when omitted.
        #[arg(long)]
        storage: Option<PathBuf>,

        /// Base URL of the agent host that executes steps.
        /// A local echo invoker is used when omitted.
        #[arg(long, env = "TRELLIS_AGENT_HOST")]
        agent_host: Option<String>,

        /// Scheduler tick interval in seconds
        #[arg(long, default_value_t = 60)]
        tick_secs: u64,

        /// App slugs to treat as connected integrations
        #[arg(long, value_delimiter = ',')]
        connected_apps: Vec<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,trellis=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        host: "127.0.0.1".to_string(),
        port: 8080,
        storage: None,
        agent_host: None,
        tick_secs: 60,
        connected_apps: Vec::new(),
    });

    match command {
        Commands::Serve {
            host,
            port,
            storage,
            agent_host,
            tick_secs,
            connected_apps,
        } => serve(host, port, storage, agent_host, tick_secs, connected_apps).await,
    }
}

async fn serve(
    host: String,
    port: u16,
    storage: Option<PathBuf>,
    agent_host: Option<String>,
    tick_secs: u64,
    connected_apps: Vec<String>,
) -> anyhow::Result<()> {
    let (workflow_store, run_store): (Arc<dyn WorkflowStore>, Arc<dyn RunStore>) = match storage {
        Some(path) => {
            info!("using file storage at {:?}", path);
            (
                Arc::new(
                    FileWorkflowStore::new(&path)
                        .await
                        .context("initializing workflow store")?,
                ),
                Arc::new(
                    FileRunStore::new(&path)
                        .await
                        .context("initializing run store")?,
                ),
            )
        }
        None => {
            warn!("no --storage given; workflows and runs are held in memory only");
            (
                Arc::new(MemoryWorkflowStore::new()),
                Arc::new(MemoryRunStore::new()),
            )
        }
    };

    let invoker: Arc<dyn StepInvoker> = match agent_host {
        Some(url) => {
            info!("steps delegate to agent host at {}", url);
            Arc::new(HttpStepInvoker::new(&url).context("initializing step invoker")?)
        }
        None => {
            warn!("no --agent-host given; steps run against a local echo invoker");
            Arc::new(MockStepInvoker::new())
        }
    };

    let notifier = NotifierHub::new();
    let engine = Arc::new(
        ExecutionEngine::new(invoker)
            .with_run_store(run_store.clone())
            .with_observer(Arc::new(notifier.clone())),
    );
    let ledger = Arc::new(RunLedger::new());

    let scheduler = Arc::new(
        Scheduler::new(workflow_store.clone(), engine.clone(), ledger.clone())
            .with_check_interval(Duration::from_secs(tick_secs)),
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let state = Arc::new(AppState::new(
        workflow_store,
        run_store,
        engine,
        ledger,
        notifier,
        Arc::new(StaticConnections::with(connected_apps)),
    ));
    let server = ApiServer::new(ApiConfig::new(host, port), state);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                anyhow::bail!("server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    Ok(())
}
