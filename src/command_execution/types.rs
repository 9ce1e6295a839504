use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Operating system family of a monitored host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostType {
    Linux,
    Windows,
    Solaris,
    Aix,
    Hpux,
    FreeBsd,
    MacOs,
    Network,
    Storage,
    OutOfBand,
}

/// Read-only view of the host a command is executed against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTarget {
    pub host_id: String,
    pub hostname: String,
    pub host_type: HostType,
    pub is_localhost: bool,
}

impl ExecutionTarget {
    /// Create a new execution target
    pub fn new(
        host_id: impl Into<String>,
        hostname: impl Into<String>,
        host_type: HostType,
        is_localhost: bool,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            hostname: hostname.into(),
            host_type,
            is_localhost,
        }
    }
}

/// Script or text payload referenced by a `${file::...}` token in a command
/// template, stored out-of-band by the connector and materialized on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedFile {
    pub content: String,
    pub extension: Option<String>,
    pub reference: String,
}

impl EmbeddedFile {
    /// Create a new embedded file payload
    pub fn new(
        content: impl Into<String>,
        extension: Option<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            extension,
            reference: reference.into(),
        }
    }
}

/// Result of a command execution: the raw output and the resolved command
/// with the password masked, safe for logging and display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub display_command: String,
}

/// Per-invocation execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Explicit timeout override, taking precedence over every configuration
    pub timeout: Option<Duration>,
    /// Run locally regardless of the configured protocol
    pub execute_locally: bool,
}
