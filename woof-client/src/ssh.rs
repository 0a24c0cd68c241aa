//! OpenSSH transport
//!
//! Keeps one authenticated control-master connection open for the lifetime of
//! the client so each poll reuses it instead of authenticating again:
//! - `connect` starts the master (`ssh -M -S <socket> -f -N`)
//! - `run` multiplexes a command over the socket
//! - `close` asks the master to exit (`ssh -O exit`)

use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result, SSH_TRANSPORT_FAILURE};
use crate::process::run_captured;
use crate::{CommandOutput, RemoteQueryClient};

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    /// Private key passed with `-i`
    pub identity_file: Option<PathBuf>,
    /// Limit for establishing the TCP connection and authenticating
    pub connect_timeout: Duration,
}

impl SshTarget {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            identity_file: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `user@host`, or just `host` when no user is set
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Options shared by every ssh invocation against this target
    ///
    /// Batch mode disables password prompts so a missing key fails fast
    /// instead of hanging on a terminal the dashboard owns.
    fn base_args(&self, socket: &Path) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-S".to_string(),
            socket.display().to_string(),
        ];
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(ref key) = self.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }
}

/// Persistent ssh session to the scheduler's login node
pub struct SshClient {
    target: SshTarget,
    query_timeout: Duration,
    socket: PathBuf,
    closed: AtomicBool,
    // Removed on drop, taking the socket with it.
    control_dir: TempDir,
}

impl SshClient {
    /// Opens the control-master connection
    ///
    /// Fails when the host is unreachable or authentication is refused, so
    /// credentials problems surface before the first poll.
    pub async fn connect(target: SshTarget, query_timeout: Duration) -> Result<Self> {
        let control_dir = tempfile::Builder::new().prefix("woof-ssh-").tempdir()?;
        let socket = control_dir.path().join("control");

        let client = Self {
            target,
            query_timeout,
            socket,
            closed: AtomicBool::new(false),
            control_dir,
        };

        client.start_master().await?;
        info!("SSH session to {} established", client.describe());

        Ok(client)
    }

    async fn start_master(&self) -> Result<()> {
        let destination = self.target.destination();

        // `-f` forks the master into the background once authenticated; its
        // stderr goes to a file so the forked process does not hold a pipe open.
        let log_path = self.control_dir.path().join("connect.log");
        let log = File::create(&log_path)?;

        let mut cmd = Command::new("ssh");
        cmd.args(self.master_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .kill_on_drop(true);

        debug!("Starting ssh control master for {}", destination);

        let child = cmd.spawn().map_err(|source| ClientError::Spawn {
            program: "ssh".to_string(),
            source,
        })?;

        // Authentication may involve several round trips on top of the TCP connect.
        let limit = self.target.connect_timeout * 3;
        let status = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result?.status,
            Err(_) => {
                return Err(ClientError::connection(
                    destination,
                    format!("no response within {:?}", limit),
                ));
            }
        };

        if !status.success() {
            let message = std::fs::read_to_string(&log_path).unwrap_or_default();
            let message = message.trim();
            return Err(ClientError::connection(
                destination,
                if message.is_empty() {
                    format!("ssh exited with status {}", status.code().unwrap_or(-1))
                } else {
                    message.to_string()
                },
            ));
        }

        Ok(())
    }

    fn master_args(&self) -> Vec<String> {
        let mut args = self.target.base_args(&self.socket);
        args.extend([
            "-M".to_string(),
            "-o".to_string(),
            "ControlPersist=yes".to_string(),
            "-f".to_string(),
            "-N".to_string(),
            self.target.destination(),
        ]);
        args
    }

    fn exec_args(&self, command: &str) -> Vec<String> {
        let mut args = self.target.base_args(&self.socket);
        args.extend([
            "-o".to_string(),
            "ControlMaster=no".to_string(),
            self.target.destination(),
            "--".to_string(),
            // Passed as one argument so the remote shell handles quoting and pipes.
            command.to_string(),
        ]);
        args
    }

    fn exit_args(&self) -> Vec<String> {
        let mut args = self.target.base_args(&self.socket);
        args.extend([
            "-O".to_string(),
            "exit".to_string(),
            self.target.destination(),
        ]);
        args
    }
}

#[async_trait]
impl RemoteQueryClient for SshClient {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::SessionClosed(self.describe()));
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.exec_args(command));

        let output = run_captured(cmd, "ssh", command, self.query_timeout).await?;

        // 255 is ssh's own failure code: the session dropped or auth expired.
        if output.exit_code == Some(SSH_TRANSPORT_FAILURE) {
            return Err(ClientError::connection(
                self.describe(),
                output.stderr.trim().to_string(),
            ));
        }

        Ok(output)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.exit_args());

        // `closed` is only set once the master confirmed its exit, so a failed
        // attempt leaves the teardown in `Drop` armed.
        let output = run_captured(cmd, "ssh", "ssh -O exit", self.target.connect_timeout).await?;
        if !output.success() {
            warn!(
                "SSH control master for {} did not exit cleanly: {}",
                self.describe(),
                output.stderr.trim()
            );
        } else {
            self.closed.store(true, Ordering::SeqCst);
            info!("SSH session to {} closed", self.describe());
        }

        Ok(())
    }

    fn describe(&self) -> String {
        self.target.destination()
    }
}

impl Drop for SshClient {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        // Last resort when the owner never called `close`: don't leave an
        // authenticated master running in the background.
        let result = std::process::Command::new("ssh")
            .args(self.exit_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        if let Err(e) = result {
            warn!("Failed to stop ssh control master on drop: {}", e);
        }
    }
}
