use thiserror::Error;
use std::io;
use std::time::Duration;

/// Result type for command execution operations
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Errors that can occur while resolving and executing a command
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid command, configuration or timeout supplied by the caller
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    /// A remote protocol requires a username and none is configured
    #[error("No username configured for remote execution on {hostname}")]
    MissingCredential { hostname: String },

    /// Embedded file reference could not be materialized
    #[error("Embedded file error: {0}")]
    EmbeddedFile(String),

    /// The local process could not be created
    #[error("Failed to start local process: {0}")]
    ProcessStart(String),

    /// Command execution exceeded its allotted time
    #[error("Command \"{}\" execution has timed out after {} s", .command, .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// Timed out waiting for an SSH session permit
    #[error("Failed to run SSH command on {hostname}: timed out waiting for an SSH session permit")]
    ConcurrencyLimit { hostname: String },

    /// Underlying SSH/WMI collaborator failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CommandError {
    /// Create a new invalid input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Create a new missing credential error
    pub fn missing_credential(hostname: impl Into<String>) -> Self {
        Self::MissingCredential {
            hostname: hostname.into(),
        }
    }

    /// Create a new embedded file error
    pub fn embedded_file(reason: impl Into<String>) -> Self {
        Self::EmbeddedFile(reason.into())
    }

    /// Create a new process start error
    pub fn process_start(reason: impl Into<String>) -> Self {
        Self::ProcessStart(reason.into())
    }

    /// Create a new timeout error
    pub fn timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            timeout,
        }
    }

    /// Create a new concurrency limit error
    pub fn concurrency_limit(hostname: impl Into<String>) -> Self {
        Self::ConcurrencyLimit {
            hostname: hostname.into(),
        }
    }

    /// Create a new transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }
}
