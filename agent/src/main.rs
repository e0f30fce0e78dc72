//! cartsync - continuous cartridge synchronization agent.
//!
//! Watches the configured cartridge tree and pushes changed files to the
//! remote instance over WebDAV, diverting configured path patterns through
//! a local build command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cartsync_agent::config::{WatchConfig, DEFAULT_CONFIG_FILE};
use cartsync_agent::observer::{LogObserver, UploadObserver};
use cartsync_agent::router::ExceptionRouter;
use cartsync_agent::uploader::UploadCoordinator;
use cartsync_agent::watcher::WatchSession;
use cartsync_agent::webdav::WebDavClient;

/// cartsync - push cartridge changes to a remote instance as you edit.
#[derive(Parser, Debug)]
#[command(name = "cartsync")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    CARTSYNC_PASSWORD    WebDAV password, overrides the config file
    RUST_LOG             Log filter (default: info)

EXAMPLES:
    # Watch with the default sync.json in the working directory
    cartsync

    # Alternate config, no desktop-style notifications
    cartsync --config deploy/sync.json --silent
")]
struct Cli {
    /// Path to the sync configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Suppress file-changed / file-uploaded notifications.
    #[arg(long)]
    silent: bool,

    /// Disable the persistent status line.
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_watch(&cli).await {
        error!(error = %e, "agent failed to start");
        return Err(e);
    }

    Ok(())
}

/// Loads configuration, starts the watch session, and dispatches events
/// until a shutdown signal arrives.
async fn run_watch(cli: &Cli) -> Result<()> {
    let config = WatchConfig::load(&cli.config, cli.silent, !cli.no_progress)
        .context("failed to load configuration")?;

    info!(
        code_version = %config.code_version,
        hostname = %config.hostname,
        "pushing changes"
    );

    let working_dir = std::env::current_dir().context("failed to determine working directory")?;

    let observer: Arc<dyn UploadObserver> =
        Arc::new(LogObserver::new(config.silent, config.show_progress));

    let transport = Arc::new(WebDavClient::new(
        &config.hostname,
        &config.username,
        &config.password,
        working_dir.clone(),
    ));

    let watching_status = format!(
        "watching '{}' for {} [Ctrl-C to cancel]",
        config.cartridges_path.display(),
        config.hostname
    );
    observer.set_status(&watching_status);

    let coordinator = Arc::new(UploadCoordinator::new(
        transport,
        Arc::clone(&observer),
        &config.cartridges_path,
        &config.code_version,
        watching_status,
    ));

    let router = Arc::new(ExceptionRouter::new(config.build_exceptions.clone()));

    let (_session, mut events_rx) = WatchSession::start(&working_dir, &config)
        .context("failed to start watch session")?;

    info!("watching for changes, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("shutdown signal received");
                break;
            }

            maybe_path = events_rx.recv() => {
                let Some(relative_path) = maybe_path else {
                    error!("watch event channel closed unexpectedly");
                    break;
                };

                // Uploads for distinct paths may overlap; the coordinator's
                // in-flight set keeps each individual path exclusive.
                let router = Arc::clone(&router);
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    router
                        .route(&relative_path, |path| async move {
                            coordinator.upload(&path).await;
                        })
                        .await;
                });
            }
        }
    }

    info!("agent stopped");
    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
