//! CLI commands for mozbuilds
//!
//! Provides command-line access to the lookups, downloads and the cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use mozbuilds_cache::DownloadState;
use mozbuilds_core::{
    AbiProbe, App, AppConfig, Channel, HttpTransport, Installer, MozBuildsError, NoopInstaller,
    StaticAbis,
};
use mozbuilds_device::{AdbClient, AdbInstaller, DeviceAbis};
use mozbuilds_treeherder::Resolution;

use crate::orchestrator::Orchestrator;
use crate::snapshot::{ArtifactSnapshot, PushSnapshot, ReleaseSet};

#[derive(Debug, Parser)]
#[command(name = "mozbuilds", version, about = "Find, download and install Mozilla Android builds")]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "MOZBUILDS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the latest builds of an app
    Latest {
        /// fenix, focus or reference-browser
        app: App,
        #[arg(long, default_value_t = Channel::Nightly)]
        channel: Channel,
        /// Nightly of a given day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the APKs of a GitHub repository's latest release
    Github {
        /// owner/repo
        repository: String,
    },
    /// Resolve a revision to its signed build artifacts
    Revision {
        revision: String,
        #[arg(long, default_value = "try")]
        project: String,
    },
    /// Resolve an author's recent try pushes
    Author { email: String },
    /// Download the build matching the device and install it
    Download {
        app: App,
        #[arg(long, default_value_t = Channel::Nightly)]
        channel: Channel,
        /// Use this ABI instead of asking the device
        #[arg(long)]
        abi: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only download
        #[arg(long)]
        no_install: bool,
    },
    /// Inspect or clear the download cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show the ABIs of the connected device
    Abis,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CacheAction {
    /// Report whether any build is cached
    Status,
    /// Delete every cached build
    Clear,
}

/// Load configuration from `--config` or the default location
pub async fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path).await,
        None => AppConfig::load().await,
    };
    config.context("Failed to load configuration")
}

struct Session {
    orchestrator: Orchestrator,
    installer: Option<Arc<AdbInstaller>>,
}

fn session(config: &AppConfig, install: bool) -> Result<Session> {
    let transport = Arc::new(HttpTransport::new(&config.network)?);
    let adb = Arc::new(AdbClient::new(config.device.sdk_path.clone()));
    debug!("Using adb at {:?}", adb.adb_path());

    let probe: Arc<dyn AbiProbe> = match &config.device.abis {
        Some(abis) => Arc::new(StaticAbis(abis.clone())),
        None => Arc::new(DeviceAbis::new(Arc::clone(&adb), config.device.serial.clone())),
    };

    let adb_installer =
        install.then(|| Arc::new(AdbInstaller::new(adb, config.device.serial.clone())));
    let installer: Arc<dyn Installer> = match &adb_installer {
        Some(installer) => installer.clone(),
        None => Arc::new(NoopInstaller),
    };

    Ok(Session {
        orchestrator: Orchestrator::from_config(config, transport, installer, probe),
        installer: adb_installer,
    })
}

/// Execute a parsed command line. Pipeline errors are reported with their
/// short user message.
pub async fn run(cli: Cli) -> Result<()> {
    execute(cli).await.map_err(user_facing)
}

fn user_facing(err: anyhow::Error) -> anyhow::Error {
    match err.downcast::<MozBuildsError>() {
        Ok(err) => anyhow::anyhow!(err.user_message()),
        Err(err) => err,
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref()).await?;
    let install = matches!(cli.command, Command::Download { no_install: false, .. });
    let Session { orchestrator, installer } = session(&config, install)?;
    let json = cli.json;

    match cli.command {
        Command::Latest { app, channel, date } => {
            let set = orchestrator.latest_release_set(app, channel, date).await?;
            emit(json, &set, print_release_set)?;
        }
        Command::Github { repository } => {
            let Some((owner, repo)) = repository.split_once('/') else {
                bail!("Expected owner/repo, got '{}'", repository);
            };
            let set = orchestrator.github_release(owner, repo).await?;
            emit(json, &set, print_release_set)?;
        }
        Command::Revision { revision, project } => {
            match orchestrator.resolve_revision(&project, &revision).await? {
                Resolution::Found(push) => emit(json, &push, print_push)?,
                Resolution::Empty(reason) => println!("{}", reason),
            }
        }
        Command::Author { email } => match orchestrator.resolve_author(&email).await? {
            Resolution::Found(pushes) => emit(json, &pushes, |pushes| {
                pushes.iter().for_each(print_push)
            })?,
            Resolution::Empty(reason) => println!("{}", reason),
        },
        Command::Download { app, channel, abi, date, .. } => {
            let set = orchestrator.latest_release_set(app, channel, date).await?;
            let abis = match abi {
                Some(abi) => vec![abi],
                None => orchestrator.supported_abis().await,
            };
            let Some(artifact) = set.best_for(&abis) else {
                bail!("No {} {} build matches ABIs {:?}", app, channel, abis);
            };

            let path = download(&orchestrator, artifact).await?;
            println!("{}", path.display());

            if let Some(installer) = installer {
                if !artifact.state.can_start() {
                    // Already cached, so the download never ran the installer
                    installer.install(&path);
                }
                installer.wait_idle().await;
            }
        }
        Command::Cache { action } => {
            let state = match action {
                CacheAction::Status => orchestrator.cache().check_cache_status().await,
                CacheAction::Clear => orchestrator.downloads().clear_cache().await,
            };
            let root = orchestrator.cache().root().display();
            emit(json, &state, |state| println!("{:?} ({})", state, root))?;
        }
        Command::Abis => {
            let abis = orchestrator.supported_abis().await;
            emit(json, &abis, |abis| {
                if abis.is_empty() {
                    println!("No device ABIs available");
                }
                abis.iter().for_each(|abi| println!("{}", abi));
            })?;
        }
    }

    Ok(())
}

/// Download one artifact, rendering progress on stderr
async fn download(orchestrator: &Orchestrator, artifact: &ArtifactSnapshot) -> Result<PathBuf> {
    let downloads = orchestrator.downloads();
    let mut updates = downloads.subscribe(&artifact.request).await;

    if let Some(handle) = orchestrator.download(artifact).await {
        info!("Downloading {}", artifact.record.download_url);
        let render = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                match &*updates.borrow_and_update() {
                    DownloadState::InProgress { indeterminate: false, progress } => {
                        eprint!("\r{:>5.1}%", progress * 100.0)
                    }
                    DownloadState::InProgress { indeterminate: true, .. } => {
                        eprint!("\rdownloading...")
                    }
                    _ => break,
                }
            }
            eprintln!();
        });

        handle.await.context("Download task failed")?;
        if tokio::time::timeout(Duration::from_secs(1), render).await.is_err() {
            eprintln!();
        }
    }

    match downloads.state(&artifact.unique_key) {
        DownloadState::Downloaded { path } => Ok(path),
        DownloadState::Failed { message } => bail!("Download failed: {}", message),
        other => bail!("Unexpected download state {:?}", other),
    }
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn state_label(state: &DownloadState) -> String {
    match state {
        DownloadState::NotDownloaded => "-".to_string(),
        DownloadState::InProgress { progress, .. } => format!("{:.0}%", progress * 100.0),
        DownloadState::Downloaded { .. } => "cached".to_string(),
        DownloadState::Failed { .. } => "failed".to_string(),
    }
}

fn print_artifact(artifact: &ArtifactSnapshot) {
    println!(
        "  {} {:<12} {:<7} {}",
        if artifact.compatible { "*" } else { " " },
        artifact.record.abi_name,
        state_label(&artifact.state),
        artifact.record.download_url
    );
}

fn print_release_set(set: &ReleaseSet) {
    if set.is_empty() {
        println!("No builds found for {}", set.app);
        return;
    }

    let channel = set.channel.map(|c| c.to_string()).unwrap_or_default();
    println!(
        "{} {} {} {}",
        set.app,
        channel,
        set.version.as_deref().unwrap_or("?"),
        set.date.as_deref().unwrap_or("")
    );
    set.artifacts.iter().for_each(print_artifact);
}

fn print_push(push: &PushSnapshot) {
    println!("push {} {} by {}", push.push_id, push.revision, push.author);
    println!("  {}", push.comment);
    for job in &push.jobs {
        println!(" {} [{}] {}", job.job_name, job.job_symbol, job.task_id);
        job.artifacts.iter().for_each(print_artifact);
    }
}
