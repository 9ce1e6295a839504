// Execution orchestrator: the façade turning a command template into a
// dispatched execution against a target host.
//
// One invocation walks a fixed sequence: validate, resolve credentials and
// timeout, rewrite sudo tokens, materialize embedded files, substitute
// macros, dispatch to the protocol runner. The temporary files created for
// the invocation are removed on every exit path.

use std::sync::Arc;

use crate::command_execution::config::{
    resolve_password, resolve_timeout, resolve_username, CommandConfiguration, ConfigKind,
    HostConfiguration,
};
use crate::command_execution::embedded::{
    default_temp_file, materialize_embedded_files, ConnectorFileStore, EmbeddedFileLookup,
    TempFileFactory,
};
use crate::command_execution::error::{CommandError, CommandResult};
use crate::command_execution::gate::SshSessionGate;
use crate::command_execution::macros::{replace_case_insensitive, substitute_macros};
use crate::command_execution::protocol::{
    run_ssh_command, LocalDispatcher, LocalRunner, RemoteSshExecutor, WinRemoteExecutor,
};
#[cfg(feature = "ssh")]
use crate::command_execution::protocol::Ssh2Executor;
use crate::command_execution::sudo::replace_sudo;
use crate::command_execution::types::{
    ExecutionOptions, ExecutionResult, ExecutionTarget, HostType,
};

/// Façade executing command templates against monitored hosts
pub struct CommandExecutor {
    local: Arc<dyn LocalDispatcher>,
    ssh: Arc<dyn RemoteSshExecutor>,
    wmi: Option<Arc<dyn WinRemoteExecutor>>,
    files: Arc<dyn EmbeddedFileLookup>,
    gate: SshSessionGate,
    temp_file_factory: Arc<TempFileFactory>,
}

/// Builder assembling a [`CommandExecutor`] from its collaborators. Every
/// collaborator has a default except the WMI executor, which is platform
/// specific and stays absent unless provided.
#[derive(Default)]
pub struct CommandExecutorBuilder {
    local: Option<Arc<dyn LocalDispatcher>>,
    ssh: Option<Arc<dyn RemoteSshExecutor>>,
    wmi: Option<Arc<dyn WinRemoteExecutor>>,
    files: Option<Arc<dyn EmbeddedFileLookup>>,
    gate: Option<SshSessionGate>,
    temp_file_factory: Option<Arc<TempFileFactory>>,
}

impl CommandExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the local process runner
    pub fn local_dispatcher(mut self, local: Arc<dyn LocalDispatcher>) -> Self {
        self.local = Some(local);
        self
    }

    /// Replace the remote SSH executor
    pub fn ssh_executor(mut self, ssh: Arc<dyn RemoteSshExecutor>) -> Self {
        self.ssh = Some(ssh);
        self
    }

    /// Install the remote Windows executor
    pub fn wmi_executor(mut self, wmi: Arc<dyn WinRemoteExecutor>) -> Self {
        self.wmi = Some(wmi);
        self
    }

    /// Install the embedded file lookup collaborator
    pub fn embedded_files(mut self, files: Arc<dyn EmbeddedFileLookup>) -> Self {
        self.files = Some(files);
        self
    }

    /// Share an existing SSH session gate
    pub fn session_gate(mut self, gate: SshSessionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Redirect temporary file creation, e.g. into a test directory
    pub fn temp_file_factory(mut self, factory: Arc<TempFileFactory>) -> Self {
        self.temp_file_factory = Some(factory);
        self
    }

    pub fn build(self) -> CommandResult<CommandExecutor> {
        let ssh: Arc<dyn RemoteSshExecutor> = match self.ssh {
            Some(ssh) => ssh,
            #[cfg(feature = "ssh")]
            None => Arc::new(Ssh2Executor::new()),
            #[cfg(not(feature = "ssh"))]
            None => {
                return Err(CommandError::invalid_input(
                    "an SSH executor must be provided when the ssh feature is disabled",
                ));
            }
        };

        Ok(CommandExecutor {
            local: self
                .local
                .unwrap_or_else(|| Arc::new(LocalRunner::new())),
            ssh,
            wmi: self.wmi,
            files: self
                .files
                .unwrap_or_else(|| Arc::new(ConnectorFileStore::new())),
            gate: self.gate.unwrap_or_default(),
            temp_file_factory: self
                .temp_file_factory
                .unwrap_or_else(|| Arc::new(default_temp_file)),
        })
    }
}

impl CommandExecutor {
    /// Builder with default collaborators
    pub fn builder() -> CommandExecutorBuilder {
        CommandExecutorBuilder::new()
    }

    /// The SSH session gate shared by this executor
    pub fn session_gate(&self) -> &SshSessionGate {
        &self.gate
    }

    /// Execute a command template against a target host.
    ///
    /// The template is resolved in place: sudo tokens rewritten per the
    /// host's policy, embedded file references materialized to temporary
    /// files and replaced with their paths, credential and hostname macros
    /// substituted. The resolved command is dispatched locally when the
    /// target is the agent host (or local execution is forced), over WMI
    /// for remote Windows hosts, over SSH otherwise.
    pub async fn execute(
        &self,
        command_line: &str,
        target: &ExecutionTarget,
        configuration: &HostConfiguration,
        options: &ExecutionOptions,
    ) -> CommandResult<ExecutionResult> {
        if command_line.trim().is_empty() {
            return Err(CommandError::invalid_input("command line must not be empty"));
        }

        let local_execution = target.is_localhost || options.execute_locally;
        let remote_windows = !local_execution && target.host_type == HostType::Windows;

        let protocol_config = if remote_windows {
            configuration.configuration(ConfigKind::Wmi)
        } else {
            configuration.configuration(ConfigKind::Ssh)
        };
        let command_config = configuration.command();

        let username = resolve_username(protocol_config, command_config);
        if !local_execution && username.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(CommandError::missing_credential(&target.hostname));
        }
        let password = resolve_password(protocol_config, command_config);
        let sudo_policy = command_config.map(CommandConfiguration::sudo_policy);

        let embedded = self.files.find(command_line)?;
        let materialized = materialize_embedded_files(
            command_line,
            sudo_policy.as_ref(),
            &embedded,
            &*self.temp_file_factory,
        )
        .await?;

        let mut command = replace_sudo(command_line, sudo_policy.as_ref());
        for file in materialized.iter() {
            command =
                replace_case_insensitive(&command, &file.reference, &file.path.to_string_lossy());
        }
        let resolved = substitute_macros(
            &command,
            username.as_deref(),
            password.as_deref(),
            &target.hostname,
        );

        let timeout = resolve_timeout(
            options.timeout,
            command_config,
            protocol_config,
            configuration.default_timeout,
        );

        log::debug!(
            "Hostname {} - Executing command: {}",
            target.hostname,
            resolved.display
        );

        let output = if local_execution {
            self.local
                .run(&resolved.command, timeout, &resolved.display)
                .await?
        } else if remote_windows {
            let wmi_config = configuration.wmi().ok_or_else(|| {
                CommandError::invalid_input(format!(
                    "no WMI configuration for host {}",
                    target.hostname
                ))
            })?;
            let executor = self.wmi.as_ref().ok_or_else(|| {
                CommandError::invalid_input("no WMI executor installed")
            })?;
            executor
                .run(
                    &target.hostname,
                    wmi_config,
                    &resolved.command,
                    &materialized.paths(),
                )
                .await?
        } else {
            let ssh_config = configuration.ssh().ok_or_else(|| {
                CommandError::invalid_input(format!(
                    "no SSH configuration for host {}",
                    target.hostname
                ))
            })?;
            run_ssh_command(
                &*self.ssh,
                &self.gate,
                &resolved.command,
                &target.hostname,
                ssh_config,
                timeout,
                &materialized.paths(),
                &resolved.display,
            )
            .await?
        };

        Ok(ExecutionResult {
            output,
            display_command: resolved.display,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_execution::config::{ProtocolConfiguration, SshConfiguration};

    fn linux_target(localhost: bool) -> ExecutionTarget {
        ExecutionTarget::new("host-1", "host", HostType::Linux, localhost)
    }

    #[tokio::test]
    async fn test_blank_command_line_is_rejected() {
        let executor = CommandExecutor::builder().build().unwrap();
        let host = HostConfiguration::new("host-1", "host", HostType::Linux);
        let result = executor
            .execute("  ", &linux_target(true), &host, &ExecutionOptions::default())
            .await;
        assert!(matches!(result, Err(CommandError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_remote_command_without_username_is_rejected_early() {
        let executor = CommandExecutor::builder().build().unwrap();
        let host = HostConfiguration::new("host-1", "host", HostType::Linux).with_configuration(
            ProtocolConfiguration::Ssh(SshConfiguration {
                username: Some("   ".to_string()),
                ..Default::default()
            }),
        );

        let result = executor
            .execute(
                "uname -r",
                &linux_target(false),
                &host,
                &ExecutionOptions::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(CommandError::MissingCredential { hostname }) if hostname == "host"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plain_local_command_resolves_to_itself() {
        let executor = CommandExecutor::builder().build().unwrap();
        let host = HostConfiguration::new("host-1", "host", HostType::Linux);

        let result = executor
            .execute(
                "echo Test",
                &linux_target(true),
                &host,
                &ExecutionOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!("Test", result.output);
        assert_eq!("echo Test", result.display_command);
    }
}
