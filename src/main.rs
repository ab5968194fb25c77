use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use macrobot::config::{self as cfg, ServerConfig};
use macrobot::executor::{DesktopDriver, DryRunDriver, InputDriver, RunController};
use macrobot::server::{self, AppState};

/// Macrobot CLI
#[derive(Debug, Parser)]
#[command(
    name = macrobot::PKG_NAME,
    version = macrobot::PKG_VERSION,
    about = "A local macro playback service built on Enigo"
)]
struct Args {
    /// Path to an optional JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(long = "port")]
    port: Option<u16>,

    /// Interface to bind (overrides the config file)
    #[arg(long = "host")]
    host: Option<String>,

    /// Directory holding the UI's static files (overrides the config file)
    #[arg(long = "ui")]
    ui: Option<PathBuf>,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    macrobot::init_tracing(args.log_level.as_deref());

    if args.print_schema {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    let config = load_config(&args).await?;
    info!(
        version = macrobot::PKG_VERSION,
        addr = %config.listen_addr(),
        dry_run = config.dry_run,
        "Starting Macrobot"
    );

    let driver: Arc<dyn InputDriver> = if config.dry_run {
        Arc::new(DryRunDriver::new())
    } else {
        Arc::new(DesktopDriver::new()?)
    };
    debug!(driver = driver.name(), "Input driver ready");

    let controller = Arc::new(RunController::start(driver.clone(), config.engine)?);

    let ui_root = std::path::absolute(&config.ui_root)
        .with_context(|| format!("Failed to resolve UI root {}", config.ui_root))?;
    let state = AppState::new(controller.clone(), driver, ui_root);
    let listener = server::bind(&config.listen_addr()).await?;

    server::serve(listener, state, shutdown_signal()).await?;

    controller.stop();
    if tokio::time::timeout(Duration::from_secs(2), controller.idle())
        .await
        .is_err()
    {
        warn!("Active run did not finish in time; exiting anyway");
    }

    info!("Macrobot exited");
    Ok(())
}

/// Resolve on Ctrl+C. If the handler cannot be installed, never resolve.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => {
            warn!(error = %err, "Failed to listen for Ctrl+C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Defaults, then the config file (if any), then command-line overrides.
async fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => cfg::load_from_path_async(path).await?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(ui) = &args.ui {
        config.ui_root = ui.display().to_string();
    }
    if args.dry_run {
        config.dry_run = true;
    }
    cfg::validate_config(&config)?;
    debug!(target: "macrobot::config", ?config, "Configuration resolved");
    Ok(config)
}
