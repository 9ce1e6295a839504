// Protocol dispatchers: one runner per execution protocol, each behind a
// small trait so the orchestrator can be exercised with substitutes.

pub mod local;
pub mod ssh;
#[cfg(feature = "ssh")]
pub mod ssh_client;
pub mod wmi;

pub use local::{LocalDispatcher, LocalRunner};
pub use ssh::{run_ssh_command, RemoteSshExecutor};
#[cfg(feature = "ssh")]
pub use ssh_client::Ssh2Executor;
pub use wmi::WinRemoteExecutor;
