// In-band IPMI command construction for Unix hosts.
//
// The interface driver handed to ipmitool depends on the host OS: always
// `open` on Linux, `lipmi` or `bmc` on Solaris depending on the version
// reported by `uname -r`.

use crate::command_execution::config::{CommandConfiguration, HostConfiguration};
use crate::command_execution::error::{CommandError, CommandResult};
use crate::command_execution::orchestrator::CommandExecutor;
use crate::command_execution::types::{ExecutionOptions, ExecutionTarget, HostType};

/// PATH priming prepended to every ipmitool invocation so the tool is found
/// on stock Linux and Solaris installations
const IPMI_PATH_PREFIX: &str = "PATH=$PATH:/usr/local/bin:/usr/sfw/bin;export PATH;";

/// Whether the sudo policy asks for ipmitool to be elevated
fn ipmitool_requires_sudo(command_config: Option<&CommandConfiguration>) -> bool {
    command_config.map_or(false, |config| {
        config.use_sudo
            || config
                .use_sudo_commands
                .iter()
                .any(|command| command.eq_ignore_ascii_case("ipmitool"))
    })
}

/// Pick the Solaris interface driver from a `uname -r` release string:
/// `lipmi` on Solaris 9, `bmc` on anything more recent
pub fn ipmi_command_for_solaris(
    base_command: &str,
    hostname: &str,
    solaris_version: &str,
) -> CommandResult<String> {
    let minor = solaris_version.split('.').nth(1).ok_or_else(|| {
        CommandError::invalid_input(format!(
            "Unknown Solaris version ({solaris_version}) for host {hostname}: IPMI cannot be executed"
        ))
    })?;
    let version: u32 = minor.trim().parse().map_err(|_| {
        CommandError::invalid_input(format!(
            "Could not identify the Solaris version as a valid one: 'uname -r' returned {solaris_version}"
        ))
    })?;

    if version == 9 {
        Ok(format!("{base_command}lipmi"))
    } else if version < 9 {
        Err(CommandError::invalid_input(format!(
            "Solaris version ({solaris_version}) is too old for host {hostname}: IPMI cannot be executed"
        )))
    } else {
        Ok(format!("{base_command}bmc"))
    }
}

/// Build the full ipmitool detection command for the target host. On
/// Solaris this probes the OS version with `uname -r` through the regular
/// execution pipeline (local or SSH).
pub async fn build_ipmi_command(
    executor: &CommandExecutor,
    target: &ExecutionTarget,
    configuration: &HostConfiguration,
) -> CommandResult<String> {
    let command_config = configuration.command();

    let mut command = if ipmitool_requires_sudo(command_config) {
        let keyword = command_config
            .map(|config| config.sudo_command.clone())
            .filter(|keyword| !keyword.is_empty())
            .unwrap_or_else(|| "sudo".to_string());
        format!("{IPMI_PATH_PREFIX}{keyword} ipmitool -I ")
    } else {
        format!("{IPMI_PATH_PREFIX}ipmitool -I ")
    };

    if target.host_type == HostType::Solaris {
        let probe = executor
            .execute(
                "/usr/bin/uname -r",
                target,
                configuration,
                &ExecutionOptions::default(),
            )
            .await?;
        command = ipmi_command_for_solaris(&command, &target.hostname, probe.output.trim())?;
    } else {
        command.push_str("open");
    }

    command.push_str(" bmc info");
    Ok(command)
}
