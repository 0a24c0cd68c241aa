//! Local transport
//!
//! Used when the watchdog runs on a host that has the scheduler tools itself,
//! typically the cluster login node.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{ClientError, Result};
use crate::process::run_captured;
use crate::{CommandOutput, RemoteQueryClient};

/// Runs commands through `sh -c` on the current host
#[derive(Debug)]
pub struct LocalClient {
    timeout: Duration,
    closed: AtomicBool,
}

impl LocalClient {
    /// Creates a local client whose commands are limited to `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RemoteQueryClient for LocalClient {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::SessionClosed(self.describe()));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);

        run_captured(cmd, "sh", command, self.timeout).await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "localhost".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_output() {
        let client = LocalClient::new(Duration::from_secs(5));
        let output = client.run("echo 'JOBID,STATE,COMMAND'; echo oops >&2").await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "JOBID,STATE,COMMAND\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_run_reports_exit_code() {
        let client = LocalClient::new(Duration::from_secs(5));
        let output = client.run("exit 3").await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(output.into_stdout("exit 3").is_err());
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let client = LocalClient::new(Duration::from_millis(100));
        let err = client.run("sleep 5").await.unwrap_err();

        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_run_after_close_fails() {
        let client = LocalClient::new(Duration::from_secs(5));
        client.close().await.unwrap();

        let err = client.run("true").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionClosed(_)));
    }
}
