// Layered host configuration model: at most one configuration per kind,
// with credential and timeout resolution falling through the layers.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::command_execution::types::HostType;

/// Built-in timeout for generic command configurations, in seconds
pub const DEFAULT_COMMAND_TIMEOUT: u64 = 30;

/// Built-in timeout for local configurations, in seconds
pub const DEFAULT_LOCAL_TIMEOUT: u64 = 30;

/// Built-in timeout for SSH configurations, in seconds
pub const DEFAULT_SSH_TIMEOUT: u64 = 120;

/// Built-in timeout for WMI configurations, in seconds
pub const DEFAULT_WMI_TIMEOUT: u64 = 120;

/// Fallback timeout for a whole collection job, in seconds
pub const DEFAULT_JOB_TIMEOUT: u64 = 300;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

fn default_sudo_keyword() -> String {
    "sudo".to_string()
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_job_timeout() -> u64 {
    DEFAULT_JOB_TIMEOUT
}

/// Rule set deciding whether a command is prefixed with a privilege
/// elevation keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SudoPolicy {
    pub enabled: bool,
    pub allowed_commands: HashSet<String>,
    pub sudo_keyword: String,
}

impl Default for SudoPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_commands: HashSet::new(),
            sudo_keyword: default_sudo_keyword(),
        }
    }
}

impl SudoPolicy {
    /// Whether the given command name is on the allow-list
    pub fn allows(&self, command_name: &str) -> bool {
        self.allowed_commands
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(command_name))
    }
}

/// Generic OS command configuration: sudo policy plus optional credentials
/// and timeout shared by every protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfiguration {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Timeout in seconds
    pub timeout: Option<u64>,
    #[serde(default)]
    pub use_sudo: bool,
    #[serde(default)]
    pub use_sudo_commands: HashSet<String>,
    #[serde(default = "default_sudo_keyword")]
    pub sudo_command: String,
}

impl Default for CommandConfiguration {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            timeout: None,
            use_sudo: false,
            use_sudo_commands: HashSet::new(),
            sudo_command: default_sudo_keyword(),
        }
    }
}

impl CommandConfiguration {
    /// Configured timeout, or the built-in default for this kind
    pub fn effective_timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT)
    }

    /// Sudo policy carried by this configuration
    pub fn sudo_policy(&self) -> SudoPolicy {
        SudoPolicy {
            enabled: self.use_sudo,
            allowed_commands: self.use_sudo_commands.clone(),
            sudo_keyword: if self.sudo_command.is_empty() {
                default_sudo_keyword()
            } else {
                self.sudo_command.clone()
            },
        }
    }
}

/// Configuration for commands forced to run on the agent host itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalConfiguration {
    /// Timeout in seconds
    pub timeout: Option<u64>,
}

impl LocalConfiguration {
    pub fn effective_timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_LOCAL_TIMEOUT)
    }
}

/// SSH protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfiguration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Timeout in seconds
    pub timeout: Option<u64>,
    #[serde(default)]
    pub use_sudo: bool,
    #[serde(default)]
    pub use_sudo_commands: HashSet<String>,
    #[serde(default = "default_sudo_keyword")]
    pub sudo_command: String,
}

impl Default for SshConfiguration {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            private_key: None,
            port: DEFAULT_SSH_PORT,
            timeout: None,
            use_sudo: false,
            use_sudo_commands: HashSet::new(),
            sudo_command: default_sudo_keyword(),
        }
    }
}

impl SshConfiguration {
    pub fn effective_timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_SSH_TIMEOUT)
    }
}

/// WMI protocol configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmiConfiguration {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Timeout in seconds
    pub timeout: Option<u64>,
}

impl WmiConfiguration {
    pub fn effective_timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_WMI_TIMEOUT)
    }
}

/// Kind of protocol configuration attached to a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigKind {
    Local,
    Ssh,
    Wmi,
    Command,
}

/// One protocol configuration attached to a host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProtocolConfiguration {
    Local(LocalConfiguration),
    Ssh(SshConfiguration),
    Wmi(WmiConfiguration),
    Command(CommandConfiguration),
}

impl ProtocolConfiguration {
    /// Kind discriminant of this configuration
    pub fn kind(&self) -> ConfigKind {
        match self {
            Self::Local(_) => ConfigKind::Local,
            Self::Ssh(_) => ConfigKind::Ssh,
            Self::Wmi(_) => ConfigKind::Wmi,
            Self::Command(_) => ConfigKind::Command,
        }
    }

    /// Username carried by this configuration, if any
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Ssh(c) => c.username.as_deref(),
            Self::Wmi(c) => c.username.as_deref(),
            Self::Command(c) => c.username.as_deref(),
        }
    }

    /// Password carried by this configuration, if any
    pub fn password(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Ssh(c) => c.password.as_deref(),
            Self::Wmi(c) => c.password.as_deref(),
            Self::Command(c) => c.password.as_deref(),
        }
    }

    /// Configured timeout, or the built-in default of this kind, in seconds
    pub fn effective_timeout(&self) -> u64 {
        match self {
            Self::Local(c) => c.effective_timeout(),
            Self::Ssh(c) => c.effective_timeout(),
            Self::Wmi(c) => c.effective_timeout(),
            Self::Command(c) => c.effective_timeout(),
        }
    }
}

/// Full configuration of a monitored host: identity plus at most one
/// protocol configuration per kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfiguration {
    pub host_id: String,
    pub hostname: String,
    pub host_type: HostType,
    /// Fallback timeout for the whole collection job, in seconds
    #[serde(default = "default_job_timeout")]
    pub default_timeout: u64,
    #[serde(default)]
    pub configurations: HashMap<ConfigKind, ProtocolConfiguration>,
}

impl HostConfiguration {
    /// Create a host configuration with no protocol configurations attached
    pub fn new(host_id: impl Into<String>, hostname: impl Into<String>, host_type: HostType) -> Self {
        Self {
            host_id: host_id.into(),
            hostname: hostname.into(),
            host_type,
            default_timeout: DEFAULT_JOB_TIMEOUT,
            configurations: HashMap::new(),
        }
    }

    /// Attach a protocol configuration, replacing any existing one of the
    /// same kind
    pub fn with_configuration(mut self, configuration: ProtocolConfiguration) -> Self {
        self.configurations
            .insert(configuration.kind(), configuration);
        self
    }

    /// Protocol configuration of the given kind
    pub fn configuration(&self, kind: ConfigKind) -> Option<&ProtocolConfiguration> {
        self.configurations.get(&kind)
    }

    /// Attached SSH configuration
    pub fn ssh(&self) -> Option<&SshConfiguration> {
        match self.configurations.get(&ConfigKind::Ssh) {
            Some(ProtocolConfiguration::Ssh(c)) => Some(c),
            _ => None,
        }
    }

    /// Attached WMI configuration
    pub fn wmi(&self) -> Option<&WmiConfiguration> {
        match self.configurations.get(&ConfigKind::Wmi) {
            Some(ProtocolConfiguration::Wmi(c)) => Some(c),
            _ => None,
        }
    }

    /// Attached generic command configuration
    pub fn command(&self) -> Option<&CommandConfiguration> {
        match self.configurations.get(&ConfigKind::Command) {
            Some(ProtocolConfiguration::Command(c)) => Some(c),
            _ => None,
        }
    }

    /// Sudo policy of this host, if a command configuration carries one
    pub fn sudo_policy(&self) -> Option<SudoPolicy> {
        self.command().map(CommandConfiguration::sudo_policy)
    }
}

/// Resolve the execution timeout from, in order: the explicit override, the
/// generic command configuration, the protocol configuration, the fallback.
/// A present configuration with no timeout set resolves to its kind's
/// built-in default instead of falling through.
pub fn resolve_timeout(
    explicit: Option<Duration>,
    command_config: Option<&CommandConfiguration>,
    protocol_config: Option<&ProtocolConfiguration>,
    fallback_secs: u64,
) -> Duration {
    if let Some(timeout) = explicit {
        return timeout;
    }
    let secs = command_config
        .map(CommandConfiguration::effective_timeout)
        .or_else(|| protocol_config.map(ProtocolConfiguration::effective_timeout))
        .unwrap_or(fallback_secs);
    Duration::from_secs(secs)
}

/// Resolve the username from the protocol configuration, then the generic
/// command configuration. Never invents a value.
pub fn resolve_username(
    protocol_config: Option<&ProtocolConfiguration>,
    command_config: Option<&CommandConfiguration>,
) -> Option<String> {
    protocol_config
        .and_then(ProtocolConfiguration::username)
        .or_else(|| command_config.and_then(|c| c.username.as_deref()))
        .map(str::to_string)
}

/// Resolve the password with the same precedence as [`resolve_username`]
pub fn resolve_password(
    protocol_config: Option<&ProtocolConfiguration>,
    command_config: Option<&CommandConfiguration>,
) -> Option<String> {
    protocol_config
        .and_then(ProtocolConfiguration::password)
        .or_else(|| command_config.and_then(|c| c.password.as_deref()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_with_timeout(timeout: Option<u64>) -> ProtocolConfiguration {
        ProtocolConfiguration::Ssh(SshConfiguration {
            timeout,
            ..Default::default()
        })
    }

    #[test]
    fn test_resolve_timeout_precedence() {
        let command_config = CommandConfiguration {
            timeout: Some(2),
            ..Default::default()
        };
        let ssh = ssh_with_timeout(Some(4));

        assert_eq!(
            Duration::from_secs(1),
            resolve_timeout(
                Some(Duration::from_secs(1)),
                Some(&command_config),
                Some(&ssh),
                5
            )
        );
        assert_eq!(
            Duration::from_secs(2),
            resolve_timeout(None, Some(&command_config), Some(&ssh), 5)
        );
        assert_eq!(
            Duration::from_secs(4),
            resolve_timeout(None, None, Some(&ssh), 5)
        );
        assert_eq!(Duration::from_secs(5), resolve_timeout(None, None, None, 5));
    }

    #[test]
    fn test_resolve_timeout_builtin_defaults() {
        // A present configuration with an unset timeout resolves to the
        // built-in default of its kind, not to the next layer.
        let command_config = CommandConfiguration::default();
        let ssh = ssh_with_timeout(Some(4));
        assert_eq!(
            Duration::from_secs(DEFAULT_COMMAND_TIMEOUT),
            resolve_timeout(None, Some(&command_config), Some(&ssh), 5)
        );

        let wmi = ProtocolConfiguration::Wmi(WmiConfiguration::default());
        assert_eq!(
            Duration::from_secs(DEFAULT_WMI_TIMEOUT),
            resolve_timeout(None, None, Some(&wmi), 5)
        );
    }

    #[test]
    fn test_resolve_username_precedence() {
        let ssh = ProtocolConfiguration::Ssh(SshConfiguration {
            username: Some("protocol-user".to_string()),
            ..Default::default()
        });
        let command_config = CommandConfiguration {
            username: Some("generic-user".to_string()),
            ..Default::default()
        };

        assert_eq!(
            Some("protocol-user".to_string()),
            resolve_username(Some(&ssh), Some(&command_config))
        );
        assert_eq!(
            Some("generic-user".to_string()),
            resolve_username(None, Some(&command_config))
        );
        assert_eq!(None, resolve_username(None, None));

        let local = ProtocolConfiguration::Local(LocalConfiguration::default());
        assert_eq!(None, resolve_username(Some(&local), None));
    }

    #[test]
    fn test_sudo_policy_allow_list_is_case_insensitive() {
        let policy = SudoPolicy {
            enabled: true,
            allowed_commands: ["/usr/sbin/raidctl".to_string()].into_iter().collect(),
            sudo_keyword: "sudo".to_string(),
        };
        assert!(policy.allows("/usr/sbin/raidctl"));
        assert!(policy.allows("/USR/SBIN/RAIDCTL"));
        assert!(!policy.allows("/usr/sbin/other"));
    }

    #[test]
    fn test_host_configuration_single_instance_per_kind() {
        let host = HostConfiguration::new("id", "host", HostType::Linux)
            .with_configuration(ssh_with_timeout(Some(1)))
            .with_configuration(ssh_with_timeout(Some(9)));
        assert_eq!(1, host.configurations.len());
        assert_eq!(Some(9), host.ssh().and_then(|c| c.timeout));
    }
}
