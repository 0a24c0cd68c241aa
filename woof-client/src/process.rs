//! Child process helpers shared by the transports

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::CommandOutput;
use crate::error::{ClientError, Result};

/// Runs `command` to completion, capturing stdout and stderr
///
/// The child is killed if it does not finish within `timeout`. `display` is
/// the command line used in errors and logs.
pub(crate) async fn run_captured(
    mut command: Command,
    program: &str,
    display: &str,
    timeout: Duration,
) -> Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| ClientError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ClientError::Timeout {
                command: display.to_string(),
                timeout,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code();

    let command_line = display;
    debug!(
        "'{}' finished: exit_code={:?}, stdout_len={}, stderr_len={}",
        command_line,
        exit_code,
        stdout.len(),
        stderr.len()
    );

    Ok(CommandOutput {
        stdout,
        stderr,
        exit_code,
    })
}
