//! Error types for the woof client

use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Exit status ssh uses for its own failures (as opposed to the remote command's)
pub const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Errors that can occur while talking to the scheduler host
#[derive(Debug, Error)]
pub enum ClientError {
    /// The helper program could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The session could not be established or was lost
    #[error("Connection to {destination} failed: {message}")]
    Connection {
        /// `user@host` the session targets
        destination: String,
        /// Diagnostic output of the transport
        message: String,
    },

    /// The command did not finish in time
    #[error("'{command}' timed out after {timeout:?}")]
    Timeout {
        /// Command line that was running
        command: String,
        /// Limit that was exceeded
        timeout: Duration,
    },

    /// The command ran but exited unsuccessfully
    #[error("'{command}' exited with status {status}: {stderr}")]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Exit status, -1 when killed by a signal
        status: i32,
        /// Captured standard error
        stderr: String,
    },

    /// The session was already closed
    #[error("Session to {0} is closed")]
    SessionClosed(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Create a connection error from a destination and diagnostic text
    pub fn connection(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the transport itself failed (as opposed to the remote command)
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::Connection { .. } | Self::SessionClosed(_)
        )
    }
}
