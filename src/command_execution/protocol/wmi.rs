use async_trait::async_trait;
use std::path::PathBuf;

use crate::command_execution::config::WmiConfiguration;
use crate::command_execution::error::CommandResult;

/// Remote Windows execution collaborator (WMI or WinRM). `local_files` are
/// the materialized files the executor must place on the remote host before
/// the command runs; their remote placement is the executor's concern.
#[async_trait]
pub trait WinRemoteExecutor: Send + Sync {
    async fn run(
        &self,
        hostname: &str,
        configuration: &WmiConfiguration,
        command: &str,
        local_files: &[PathBuf],
    ) -> CommandResult<String>;
}
