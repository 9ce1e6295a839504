// SSH protocol health check: a fixed test command run against the host,
// mapped to an up/down status instead of propagating the failure.

use crate::command_execution::config::HostConfiguration;
use crate::command_execution::orchestrator::CommandExecutor;
use crate::command_execution::types::{ExecutionOptions, ExecutionTarget};

/// Test command sent to probe the protocol
pub const SSH_TEST_COMMAND: &str = "echo test";

/// Health of a protocol on a given host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStatus {
    Up,
    Down,
}

/// Probe whether commands can be executed on the host over the configured
/// SSH/OS-command channel. Returns `None` when the host carries no SSH
/// configuration to check.
pub async fn check_ssh_protocol(
    executor: &CommandExecutor,
    target: &ExecutionTarget,
    configuration: &HostConfiguration,
) -> Option<ProtocolStatus> {
    configuration.ssh()?;

    log::info!(
        "Hostname {} - Checking SSH protocol status with an '{SSH_TEST_COMMAND}' command",
        target.hostname
    );

    match executor
        .execute(
            SSH_TEST_COMMAND,
            target,
            configuration,
            &ExecutionOptions::default(),
        )
        .await
    {
        Ok(_) => Some(ProtocolStatus::Up),
        Err(error) => {
            log::debug!(
                "Hostname {} - SSH protocol check failed: {error}",
                target.hostname
            );
            Some(ProtocolStatus::Down)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_execution::config::{ProtocolConfiguration, SshConfiguration};
    use crate::command_execution::error::{CommandError, CommandResult};
    use crate::command_execution::protocol::RemoteSshExecutor;
    use crate::command_execution::types::HostType;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedOutcome {
        outcome: Result<String, String>,
    }

    #[async_trait]
    impl RemoteSshExecutor for FixedOutcome {
        async fn run(
            &self,
            _hostname: &str,
            _username: &str,
            _password: Option<&str>,
            _private_key: Option<&Path>,
            _port: u16,
            _command: &str,
            _timeout: Duration,
            _local_files: &[PathBuf],
            _display_command: &str,
        ) -> CommandResult<String> {
            self.outcome
                .clone()
                .map_err(CommandError::transport)
        }
    }

    fn remote_target() -> ExecutionTarget {
        ExecutionTarget::new("host-1", "host", HostType::Linux, false)
    }

    fn host_with_ssh() -> HostConfiguration {
        HostConfiguration::new("host-1", "host", HostType::Linux).with_configuration(
            ProtocolConfiguration::Ssh(SshConfiguration {
                username: Some("monitor".to_string()),
                ..Default::default()
            }),
        )
    }

    #[tokio::test]
    async fn test_successful_probe_reports_up() {
        let executor = CommandExecutor::builder()
            .ssh_executor(Arc::new(FixedOutcome {
                outcome: Ok("test".to_string()),
            }))
            .build()
            .unwrap();

        let status = check_ssh_protocol(&executor, &remote_target(), &host_with_ssh()).await;
        assert_eq!(Some(ProtocolStatus::Up), status);
    }

    #[tokio::test]
    async fn test_failed_probe_reports_down_without_propagating() {
        let executor = CommandExecutor::builder()
            .ssh_executor(Arc::new(FixedOutcome {
                outcome: Err("connection refused".to_string()),
            }))
            .build()
            .unwrap();

        let status = check_ssh_protocol(&executor, &remote_target(), &host_with_ssh()).await;
        assert_eq!(Some(ProtocolStatus::Down), status);
    }

    #[tokio::test]
    async fn test_host_without_ssh_configuration_is_skipped() {
        let executor = CommandExecutor::builder().build().unwrap();
        let host = HostConfiguration::new("host-1", "host", HostType::Linux);
        let status = check_ssh_protocol(&executor, &remote_target(), &host).await;
        assert_eq!(None, status);
    }
}
