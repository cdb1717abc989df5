//! CLI binary for forge-updater.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use forge_updater::update::{EmbeddedHost, StandaloneHost};
use forge_updater::{UpdateEvent, Updater, UpdaterConfig};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Check, download and install application updates from GitHub releases.
#[derive(Parser)]
#[command(name = "forge-updater", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository to query, as `owner/name`. Overrides the config file.
    #[arg(long)]
    repo: Option<String>,

    /// Version of the installed application. Without it every release
    /// counts as newer.
    #[arg(long)]
    current_version: Option<String>,

    /// Consider prerelease builds.
    #[arg(long)]
    prerelease: bool,

    /// Only accept tags containing this label.
    #[arg(long)]
    channel: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Report whether a newer release exists.
    Check,

    /// Check, then download and verify the asset for this platform.
    Download,

    /// Check, download, then start the installer.
    Install,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("forge_updater=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => UpdaterConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => UpdaterConfig::default(),
    };
    if let Some(repo) = &cli.repo {
        config.repo = repo.clone();
    }
    if let Some(channel) = &cli.channel {
        config.channel = channel.clone();
    }
    config.allow_prerelease |= cli.prerelease;
    // The CLI drives each step itself.
    config.auto_download = false;

    let builder = Updater::builder(config);
    let builder = match &cli.current_version {
        Some(version) => builder.host(EmbeddedHost::new(version.clone())),
        None => builder.host(StandaloneHost),
    };
    let updater = builder.build()?;

    let mut check_events = updater.subscribe();
    let reporter = tokio::spawn(report_progress(updater.subscribe()));

    let Some(info) = updater.check_for_updates().await else {
        if let Some(err) = first_error(&mut check_events) {
            bail!("update check failed: {err}");
        }
        println!("No update available.");
        return Ok(());
    };

    println!("Update available: {} ({})", info.version, info.release_name);
    if !info.release_notes.is_empty() {
        println!("\n{}\n", info.release_notes.trim());
    }
    if cli.command == Command::Check {
        return Ok(());
    }

    let path = updater.download_update().await?;
    println!("\nDownloaded {}", path.display());

    if cli.command == Command::Install {
        updater.apply_update().await?;
        println!("Installer started.");
    }

    reporter.abort();
    Ok(())
}

/// First error already queued on `rx`, if any.
fn first_error(rx: &mut broadcast::Receiver<UpdateEvent>) -> Option<forge_updater::UpdateError> {
    while let Ok(event) = rx.try_recv() {
        if let UpdateEvent::Error(err) = event {
            return Some(err);
        }
    }
    None
}

async fn report_progress(mut rx: broadcast::Receiver<UpdateEvent>) {
    loop {
        match rx.recv().await {
            Ok(UpdateEvent::DownloadProgress(p)) => {
                if p.has_total() {
                    print!("\rDownloading... {:5.1}%", p.percent());
                } else {
                    print!("\rDownloading... {} bytes", p.transferred);
                }
                let _ = std::io::stdout().flush();
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
