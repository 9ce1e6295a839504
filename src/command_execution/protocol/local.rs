// Local command execution through the platform shell.

use async_trait::async_trait;
use std::env;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::command_execution::error::{CommandError, CommandResult};

/// Shells probed in order when $SHELL is not usable
const COMMON_SHELLS: &[&str] = &[
    "/bin/bash",
    "/usr/bin/bash",
    "/bin/sh",
    "/usr/bin/sh",
    "/bin/zsh",
    "/usr/bin/zsh",
    "/bin/ksh",
    "/usr/bin/ksh",
];

/// Dispatcher running a fully resolved command on the agent host
#[async_trait]
pub trait LocalDispatcher: Send + Sync {
    /// Run the command, bounded by `command_timeout`. `display_command` is
    /// the password-masked variant used in logs and error messages.
    async fn run(
        &self,
        command: &str,
        command_timeout: Duration,
        display_command: &str,
    ) -> CommandResult<String>;
}

/// Local process runner: wraps the command in the platform command
/// interpreter, captures standard output, kills the process on timeout
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }

    /// The interpreter and flag the command is handed to: `%ComSpec% /C` on
    /// Windows, `$SHELL -c` elsewhere with a fallback ladder of common
    /// shells
    fn shell_invocation() -> (String, &'static str) {
        if cfg!(target_os = "windows") {
            let interpreter = env::var("ComSpec")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "cmd.exe".to_string());
            (interpreter, "/C")
        } else {
            let shell = env::var("SHELL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| {
                    COMMON_SHELLS
                        .iter()
                        .find(|candidate| Path::new(candidate).exists())
                        .map(|candidate| candidate.to_string())
                })
                .unwrap_or_else(|| "/bin/sh".to_string());
            (shell, "-c")
        }
    }
}

#[async_trait]
impl LocalDispatcher for LocalRunner {
    async fn run(
        &self,
        command: &str,
        command_timeout: Duration,
        display_command: &str,
    ) -> CommandResult<String> {
        if command.trim().is_empty() {
            return Err(CommandError::invalid_input("command must not be empty"));
        }
        if command_timeout.is_zero() {
            return Err(CommandError::invalid_input(
                "timeout must not be negative nor zero",
            ));
        }

        let (interpreter, flag) = Self::shell_invocation();
        log::debug!("Running local command through {interpreter}: {display_command}");

        let child = Command::new(&interpreter)
            .arg(flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| CommandError::process_start(error.to_string()))?;

        // Dropping the in-flight future on timeout kills the child.
        match timeout(command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(normalize_output(&output.stdout)),
            Ok(Err(error)) => Err(error.into()),
            Err(_) => Err(CommandError::timeout(display_command, command_timeout)),
        }
    }
}

fn normalize_output(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .replace("\r\n", "\n")
        .trim_end_matches('\n')
        .to_string()
}
