//! corrald - control-plane daemon that turns a workstation into a miniature
//! mobile device farm.
//!
//! This is the binary entry point (A4, §4.15). All logic lives in the library
//! crates; this file only parses arguments, wires up logging, and maps the
//! result to an exit code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use corral_app::{InstallLock, OrchestratorRoot};
use corral_core::prelude::*;

/// corrald - mobile device farm control plane
#[derive(Parser, Debug)]
#[command(name = "corrald")]
#[command(about = "Control-plane daemon for a workstation-local mobile device farm", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON configuration document
    #[arg(long, global = true, value_name = "PATH", default_value = "corral.json")]
    config: PathBuf,

    /// Validate configuration and print the planned actions without performing them
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and prepare the install folder, then exit
    Install {
        /// Remove any pre-existing contents of the install folder before preparing it
        #[arg(long)]
        force_clean: bool,
    },
    /// Acquire the install lock and run the control plane until interrupted
    Listen,
}

#[tokio::main]
async fn main() {
    if let Err(e) = corral_core::logging::init() {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let args = Args::parse();
    let result = run(args).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("corrald exiting: {e}");
            std::process::exit(if e.is_fatal() { 1 } else { 0 });
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = corral_app::config::load(&args.config).await?;

    match args.command {
        Commands::Install { force_clean } => install(&config, force_clean, args.dry_run).await,
        Commands::Listen => listen(config, args.dry_run).await,
    }
}

async fn install(config: &corral_core::Config, force_clean: bool, dry_run: bool) -> Result<()> {
    info!("preparing install folder at {}", config.install_folder.display());

    if dry_run {
        info!("dry run: would prepare {} plugin definition(s)", config.plugins.len());
        return Ok(());
    }

    if force_clean && config.install_folder.exists() {
        warn!("--force-clean: removing existing install folder {}", config.install_folder.display());
        std::fs::remove_dir_all(&config.install_folder)
            .map_err(|e| Error::configuration(vec![format!("failed to clean install folder: {e}")]))?;
    }

    std::fs::create_dir_all(&config.install_folder)
        .map_err(|e| Error::configuration(vec![format!("failed to create install folder: {e}")]))?;

    info!("install folder ready at {}", config.install_folder.display());
    Ok(())
}

async fn listen(config: corral_core::Config, dry_run: bool) -> Result<()> {
    if dry_run {
        info!(
            "dry run: would listen with {} plugin definition(s), install folder {}",
            config.plugins.len(),
            config.install_folder.display()
        );
        return Ok(());
    }

    let _lock = InstallLock::acquire(&config.install_folder)?;
    let root = OrchestratorRoot::start(config).await?;

    wait_for_shutdown_signal().await;
    root.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
