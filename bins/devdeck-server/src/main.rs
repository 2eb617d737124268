use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use devdeck_process_management::{DeployRunner, DevDeckConfig, ProcessManager};
use devdeck_project_registry::{AppState, ControlPlaneServer, ProjectStore};

/// DevDeck - local control plane for development projects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML); built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Host to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Stop every running project when the server shuts down
    #[arg(long)]
    stop_on_exit: bool,

    /// Run duration in seconds (for testing)
    #[arg(long)]
    run_duration: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DevDeckConfig::load_from_file(path)?,
        None => DevDeckConfig::default(),
    };

    // Override server options if specified
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate().context("Invalid configuration")?;

    initialize_logging(args.debug, &config.server.log_level)?;

    info!("Starting DevDeck server v{}", devdeck_process_management::VERSION);
    match &args.config {
        Some(path) => info!("Config file: {}", path),
        None => info!("No config file given, using defaults"),
    }

    let store = Arc::new(ProjectStore::open(&config.server.projects_file));
    let manager = ProcessManager::new(&config, store.clone());
    let state = AppState {
        store,
        manager: manager.clone(),
        deployer: Arc::new(DeployRunner::new(&config)),
    };

    if !Path::new(&config.server.static_dir).is_dir() {
        warn!("Static UI directory {} not found; only the API will be served", config.server.static_dir);
    }

    let token = CancellationToken::new();
    let reconciler = manager.spawn_reconciler(token.clone());

    // Cancel everything on signal or when the test run duration elapses
    let trigger = token.clone();
    let run_duration = args.run_duration;
    tokio::spawn(async move {
        match run_duration {
            Some(secs) => {
                info!("Running for {} seconds (test mode)", secs);
                tokio::time::sleep(tokio::time::Duration::from_secs(secs)).await;
            }
            None => wait_for_shutdown_signal().await,
        }
        trigger.cancel();
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server = ControlPlaneServer::new(state, &config.server.static_dir);
    let shutdown = {
        let token = token.clone();
        async move { token.cancelled().await }
    };

    let served = server.run(&addr, shutdown).await;
    // Stop background work whatever ended the server
    token.cancel();

    if let Some(handle) = reconciler {
        if let Err(e) = handle.await {
            error!("Reconciler task failed: {}", e);
        }
    }

    if args.stop_on_exit {
        info!("Stopping running projects...");
        let stopped = manager.stop_all().await;
        info!("Stopped {} project(s)", stopped.len());
    } else {
        let running = manager.registry().len();
        if running > 0 {
            info!("Leaving {} project process(es) running", running);
        }
    }

    served.with_context(|| format!("Server on {} failed", addr))?;
    info!("DevDeck server shut down successfully");
    Ok(())
}

fn initialize_logging(debug: bool, configured_level: &str) -> Result<()> {
    let level = if debug { "debug" } else { configured_level };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        use signal::unix::{signal as unix_signal, SignalKind};

        match (
            unix_signal(SignalKind::terminate()),
            unix_signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT signal");
                    }
                }
            }
            _ => {
                warn!("Failed to install Unix signal handlers, falling back to Ctrl+C");
                let _ = signal::ctrl_c().await;
                info!("Received Ctrl+C signal");
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
