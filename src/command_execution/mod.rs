// Command Execution Module
//
// Turns abstract command templates into concrete, safely executed
// operations against local and remote hosts, behind one contract for the
// local shell, SSH and WMI protocols.

pub mod config;
pub mod embedded;
pub mod error;
pub mod gate;
pub mod health;
pub mod ipmi;
pub mod macros;
pub mod orchestrator;
pub mod protocol;
pub mod sudo;
pub mod types;

// Re-export main types and traits
pub use config::{
    resolve_password, resolve_timeout, resolve_username, CommandConfiguration, ConfigKind,
    HostConfiguration, LocalConfiguration, ProtocolConfiguration, SshConfiguration, SudoPolicy,
    WmiConfiguration,
};
pub use embedded::{
    default_temp_file, materialize_embedded_files, ConnectorFileStore, EmbeddedFileLookup,
    MaterializedFile, MaterializedFiles, TempFileFactory, EMBEDDED_TEMP_PREFIX,
};
pub use error::{CommandError, CommandResult};
pub use gate::{SshSessionGate, DEFAULT_PERMIT_WAIT, MAX_SSH_SESSIONS_PER_HOST};
pub use health::{check_ssh_protocol, ProtocolStatus, SSH_TEST_COMMAND};
pub use ipmi::build_ipmi_command;
pub use macros::{
    substitute_macros, ResolvedCommand, HOSTNAME_MACRO, PASSWORD_MACRO, PASSWORD_MASK,
    USERNAME_MACRO,
};
pub use orchestrator::{CommandExecutor, CommandExecutorBuilder};
pub use protocol::{LocalDispatcher, LocalRunner, RemoteSshExecutor, WinRemoteExecutor};
#[cfg(feature = "ssh")]
pub use protocol::Ssh2Executor;
pub use sudo::{file_name_from_sudo_command, replace_sudo};
pub use types::{EmbeddedFile, ExecutionOptions, ExecutionResult, ExecutionTarget, HostType};
