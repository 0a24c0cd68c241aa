//! Woof
//!
//! A watchdog for batch simulation campaigns on a scheduler-managed cluster.
//!
//! Architecture:
//! - Configuration: command-line flags with environment fallbacks
//! - Discovery: one scan of the watched tree for run descriptors
//! - Store: the authoritative per-job status table
//! - Services: artifact inspection, queue reconciliation, group aggregation
//! - Presenter: the terminal dashboard
//! - Scheduler: the refresh loop and shutdown handling
//!
//! Each cycle reads completion artifacts from the shared filesystem, merges in
//! the scheduler queue fetched over SSH, and redraws per-group progress with
//! an ETA.

mod config;
mod discovery;
mod presenter;
mod scheduler;
mod service;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use woof_client::{LocalClient, RemoteQueryClient, SshClient};

use crate::config::{Config, DEFAULT_QUERY_TEMPLATE};
use crate::presenter::ConsoleTerminal;
use crate::scheduler::Guard;
use crate::service::Reconciler;
use crate::store::JobStore;

#[derive(Parser, Debug)]
#[command(name = "woof")]
#[command(version, about = "Watch batch simulations and the scheduler queue", long_about = None)]
struct Cli {
    /// Directory tree containing the simulation groups
    #[arg(env = "WOOF_ROOT")]
    root: PathBuf,

    /// Scheduler login host; the query runs locally when omitted
    #[arg(long, env = "WOOF_HOST")]
    host: Option<String>,

    /// Cluster user whose jobs are listed (defaults to $USER)
    #[arg(short, long, env = "WOOF_USER")]
    user: Option<String>,

    /// SSH port
    #[arg(short, long, env = "WOOF_PORT")]
    port: Option<u16>,

    /// SSH private key
    #[arg(short, long, env = "WOOF_IDENTITY_FILE")]
    identity_file: Option<PathBuf>,

    /// Seconds between refreshes
    #[arg(short = 'n', long, env = "WOOF_INTERVAL", default_value_t = 30)]
    interval: u64,

    /// Seconds allowed for one queue query
    #[arg(long, env = "WOOF_QUERY_TIMEOUT", default_value_t = 20)]
    query_timeout: u64,

    /// Seconds allowed for establishing the SSH session
    #[arg(long, env = "WOOF_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Queue command; `{user}` is replaced by the user name
    #[arg(long, env = "WOOF_QUERY", default_value = DEFAULT_QUERY_TEMPLATE)]
    query: String,

    /// Field separator of the queue output
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Suffix of run descriptor files
    #[arg(long, default_value = ".run")]
    run_suffix: String,

    /// Suffix of completion artifacts
    #[arg(long, default_value = ".omd")]
    artifact_suffix: String,

    /// Line marking a successful run
    #[arg(long, default_value = "MD++ finished successfully")]
    sentinel: String,

    /// Trailing artifact lines inspected
    #[arg(long, default_value_t = 10)]
    tail_lines: usize,

    /// Hide the progress bars
    #[arg(long)]
    no_progress_bar: bool,

    /// Width of the progress bars
    #[arg(long, default_value_t = 75)]
    bar_width: usize,

    /// Refresh once and exit
    #[arg(long)]
    once: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "WOOF_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Config {
        let user = self
            .user
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default();

        let mut config = Config::new(self.root, user);
        config.host = self.host;
        config.port = self.port;
        config.identity_file = self.identity_file;
        config.refresh_interval = Duration::from_secs(self.interval);
        config.query_timeout = Duration::from_secs(self.query_timeout);
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.query_template = self.query;
        config.delimiter = self.delimiter;
        config.artifact.run_suffix = self.run_suffix;
        config.artifact.artifact_suffix = self.artifact_suffix;
        config.artifact.sentinel = self.sentinel;
        config.artifact.tail_lines = self.tail_lines;
        config.dashboard.progress_bar = !self.no_progress_bar;
        config.dashboard.bar_width = self.bar_width;
        config.once = self.once;
        config.log_file = self.log_file;
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config();

    init_tracing(config.log_file.as_deref())?;
    config.validate().context("Invalid configuration")?;

    info!("Starting woof");
    info!(
        "Loaded configuration: root={}, host={}, user={}",
        config.root.display(),
        config.host.as_deref().unwrap_or("<local>"),
        config.user
    );

    let root = discovery::resolve_root(&config.root)?;
    let identities = discovery::discover_jobs(&root, &config.artifact.run_suffix)
        .context("Failed to discover run descriptors")?;
    let store = JobStore::new(identities);
    if store.is_empty() {
        warn!("No run descriptors found under {}", root.display());
    }

    let client = connect(&config).await?;
    info!("Scheduler client initialized ({})", client.describe());

    let reconciler = Reconciler::new(
        Arc::clone(&client),
        config.artifact.clone(),
        config.queue_query(),
    );

    let mut guard = Guard::new(
        root,
        store,
        reconciler,
        client,
        ConsoleTerminal::new(),
        config.dashboard,
        config.refresh_interval,
    );

    if config.once {
        guard.run_once().await
    } else {
        guard.run().await
    }
}

/// Logs go to stderr, or to `log_file` without colors
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "woof=info,woof_client=info".into());

    let (file_layer, stderr_layer) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

/// Opens the SSH session, or a local client when no host is configured
async fn connect(config: &Config) -> Result<Arc<dyn RemoteQueryClient>> {
    match config.ssh_target() {
        Some(target) => {
            let destination = target.destination();
            info!("Connecting to {}", destination);
            let client = SshClient::connect(target, config.query_timeout)
                .await
                .with_context(|| format!("Failed to connect to {}", destination))?;
            Ok(Arc::new(client))
        }
        None => {
            info!("No host given, querying the scheduler on this machine");
            Ok(Arc::new(LocalClient::new(config.query_timeout)))
        }
    }
}
