//! Watchdog configuration
//!
//! Defines every tunable of the watchdog: the watched tree, how to reach the
//! scheduler host, the queue query and the artifact conventions.

use std::path::PathBuf;
use std::time::Duration;
use woof_client::SshTarget;
use woof_core::queue::DEFAULT_DELIMITER;

use crate::presenter::DashboardOptions;
use crate::service::{ArtifactRules, QueueQuery};

/// Placeholder replaced by the user name in the query template
pub const USER_PLACEHOLDER: &str = "{user}";

/// Default queue query; the format string yields `id,state,command` rows
pub const DEFAULT_QUERY_TEMPLATE: &str = "squeue -u {user} -o '%A,%T,%o'";

/// Watchdog configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory tree scanned for run descriptors
    pub root: PathBuf,

    /// Scheduler host reached over SSH; `None` queries the local host
    pub host: Option<String>,

    /// Account whose jobs are listed, also used as the SSH login
    pub user: String,

    pub port: Option<u16>,

    pub identity_file: Option<PathBuf>,

    /// Time between two refresh cycles
    pub refresh_interval: Duration,

    /// Upper bound for one queue query
    pub query_timeout: Duration,

    /// Upper bound for establishing the SSH session
    pub connect_timeout: Duration,

    /// Queue command with a `{user}` placeholder
    pub query_template: String,

    /// Field separator of the query output
    pub delimiter: char,

    pub artifact: ArtifactRules,

    pub dashboard: DashboardOptions,

    /// Run a single cycle and exit
    pub once: bool,

    /// Write logs to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(root: impl Into<PathBuf>, user: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            host: None,
            user: user.into(),
            port: None,
            identity_file: None,
            refresh_interval: Duration::from_secs(30),
            query_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            query_template: DEFAULT_QUERY_TEMPLATE.to_string(),
            delimiter: DEFAULT_DELIMITER,
            artifact: ArtifactRules::default(),
            dashboard: DashboardOptions::default(),
            once: false,
            log_file: None,
        }
    }

    /// The queue command with the user substituted
    pub fn query_command(&self) -> String {
        self.query_template.replace(USER_PLACEHOLDER, &self.user)
    }

    pub fn queue_query(&self) -> QueueQuery {
        QueueQuery {
            command: self.query_command(),
            delimiter: self.delimiter,
        }
    }

    /// SSH destination, or `None` in local mode
    pub fn ssh_target(&self) -> Option<SshTarget> {
        let host = self.host.as_ref()?;

        let mut target = SshTarget::new(host.clone())
            .with_user(self.user.clone())
            .with_connect_timeout(self.connect_timeout);
        if let Some(port) = self.port {
            target = target.with_port(port);
        }
        if let Some(identity_file) = &self.identity_file {
            target = target.with_identity_file(identity_file.clone());
        }
        Some(target)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.user.is_empty() {
            anyhow::bail!("user cannot be empty (set --user or $USER)");
        }

        // The user is pasted into a shell command line.
        if !self
            .user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            anyhow::bail!("user '{}' contains unsupported characters", self.user);
        }

        if self.host.as_deref().is_some_and(str::is_empty) {
            anyhow::bail!("host cannot be empty");
        }

        if self.refresh_interval.is_zero() {
            anyhow::bail!("refresh_interval must be greater than 0");
        }

        if self.query_timeout.is_zero() {
            anyhow::bail!("query_timeout must be greater than 0");
        }

        if self.connect_timeout.is_zero() {
            anyhow::bail!("connect_timeout must be greater than 0");
        }

        if !self.query_template.contains(USER_PLACEHOLDER) {
            anyhow::bail!("query template must contain {}", USER_PLACEHOLDER);
        }

        if self.delimiter.is_whitespace() {
            anyhow::bail!("delimiter cannot be whitespace");
        }

        let rules = &self.artifact;
        if rules.run_suffix.is_empty() || rules.artifact_suffix.is_empty() {
            anyhow::bail!("run and artifact suffixes cannot be empty");
        }

        if rules.run_suffix == rules.artifact_suffix {
            anyhow::bail!("run and artifact suffixes must differ");
        }

        if rules.sentinel.trim().is_empty() {
            anyhow::bail!("sentinel cannot be empty");
        }

        if rules.tail_lines == 0 {
            anyhow::bail!("tail_lines must be greater than 0");
        }

        if self.dashboard.progress_bar && self.dashboard.bar_width == 0 {
            anyhow::bail!("bar_width must be greater than 0");
        }

        Ok(())
    }
}
