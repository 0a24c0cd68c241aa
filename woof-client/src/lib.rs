//! Woof remote query client
//!
//! Runs scheduler query commands on the cluster and hands back their raw
//! output. Two transports implement [`RemoteQueryClient`]:
//! - [`SshClient`]: a persistent OpenSSH control-master session to a login node
//! - [`LocalClient`]: runs the command on this host through `sh -c`
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use woof_client::{RemoteQueryClient, SshClient, SshTarget};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = SshTarget::new("login.cluster.example").with_user("alice");
//!     let client = SshClient::connect(target, Duration::from_secs(20)).await?;
//!
//!     let output = client.run("squeue -u alice -o '%A,%T,%o'").await?;
//!     println!("{}", output.into_stdout("squeue")?);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod local;
mod process;
mod ssh;

pub use error::{ClientError, Result};
pub use local::LocalClient;
pub use ssh::{SshClient, SshTarget};

use async_trait::async_trait;

/// Captured result of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout, or an error carrying stderr when the command failed
    pub fn into_stdout(self, command: &str) -> Result<String> {
        if self.success() {
            return Ok(self.stdout);
        }
        Err(ClientError::CommandFailed {
            command: command.to_string(),
            status: self.exit_code.unwrap_or(-1),
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Executes commands on the host that runs the scheduler
///
/// Implementations own the connection lifecycle: the session is opened by the
/// constructor and released by [`RemoteQueryClient::close`].
#[async_trait]
pub trait RemoteQueryClient: Send + Sync {
    /// Runs one command line and captures its output
    ///
    /// A non-zero exit status of the command is not an error at this level;
    /// use [`CommandOutput::into_stdout`] to turn it into one.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Releases the session; further calls to `run` fail
    async fn close(&self) -> Result<()>;

    /// Human-readable description of where commands run
    fn describe(&self) -> String;
}
