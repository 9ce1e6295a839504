// SSH command dispatch: validation plus admission control around the
// remote executor collaborator.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command_execution::config::SshConfiguration;
use crate::command_execution::error::{CommandError, CommandResult};
use crate::command_execution::gate::{SshSessionGate, DEFAULT_PERMIT_WAIT};

/// Remote SSH execution collaborator: connect and authenticate, upload the
/// given local files first, run the command, return captured output
#[async_trait]
pub trait RemoteSshExecutor: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        hostname: &str,
        username: &str,
        password: Option<&str>,
        private_key: Option<&Path>,
        port: u16,
        command: &str,
        timeout: Duration,
        local_files: &[PathBuf],
        display_command: &str,
    ) -> CommandResult<String>;
}

/// Run a command on a remote host over SSH, holding one of the host's
/// session permits for the duration of the call
#[allow(clippy::too_many_arguments)]
pub async fn run_ssh_command(
    executor: &dyn RemoteSshExecutor,
    gate: &SshSessionGate,
    command: &str,
    hostname: &str,
    configuration: &SshConfiguration,
    timeout: Duration,
    local_files: &[PathBuf],
    display_command: &str,
) -> CommandResult<String> {
    if command.trim().is_empty() {
        return Err(CommandError::invalid_input("command must not be empty"));
    }
    if hostname.trim().is_empty() {
        return Err(CommandError::invalid_input("hostname must not be empty"));
    }
    if timeout.is_zero() {
        return Err(CommandError::invalid_input(
            "timeout must not be negative nor zero",
        ));
    }

    let username = configuration.username.as_deref().unwrap_or_default();

    gate.run_controlled(
        hostname,
        DEFAULT_PERMIT_WAIT,
        executor.run(
            hostname,
            username,
            configuration.password.as_deref(),
            configuration.private_key.as_deref(),
            configuration.port,
            command,
            timeout,
            local_files,
            display_command,
        ),
    )
    .await
}
