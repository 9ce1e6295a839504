pub mod command_execution;

pub use command_execution::{
    CommandError, CommandExecutor, CommandExecutorBuilder, CommandResult, ConnectorFileStore,
    EmbeddedFile, EmbeddedFileLookup, ExecutionOptions, ExecutionResult, ExecutionTarget,
    HostConfiguration, HostType, SshSessionGate,
};
