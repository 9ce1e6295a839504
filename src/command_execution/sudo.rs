// Selective privilege elevation: `%{SUDO:<command>}` tokens are rewritten
// to the configured sudo keyword when the policy allows the named command,
// and dropped otherwise. No token survives a pass, so rewriting is
// idempotent.

use regex::{Captures, Regex};

use crate::command_execution::config::SudoPolicy;

fn sudo_token_pattern() -> Regex {
    Regex::new(r"(?i)%\{SUDO:([^}]*)\}").expect("sudo token pattern is valid")
}

/// Rewrite every `%{SUDO:<name>}` token in `text` according to the policy:
/// the sudo keyword when enabled and `<name>` is allow-listed, nothing
/// otherwise. A `None` policy means no elevation anywhere.
pub fn replace_sudo(text: &str, policy: Option<&SudoPolicy>) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }

    sudo_token_pattern()
        .replace_all(text, |caps: &Captures| {
            let command_name = &caps[1];
            match policy {
                Some(policy) if policy.enabled && policy.allows(command_name) => {
                    policy.sudo_keyword.clone()
                }
                _ => String::new(),
            }
        })
        .into_owned()
}

/// Extract the command name inside the first `%{SUDO:...}` token of a
/// command line, e.g. `"%{SUDO:/usr/sbin/raidctl} /usr/sbin/raidctl -S"`
/// yields `"/usr/sbin/raidctl"`
pub fn file_name_from_sudo_command(command: &str) -> Option<String> {
    sudo_token_pattern()
        .captures(command)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn policy(enabled: bool, allowed: &[&str]) -> SudoPolicy {
        SudoPolicy {
            enabled,
            allowed_commands: allowed.iter().map(|c| c.to_string()).collect(),
            sudo_keyword: "sudo".to_string(),
        }
    }

    #[test]
    fn test_disabled_policy_drops_token() {
        let disabled = policy(false, &[]);
        assert_eq!(" key", replace_sudo("%{SUDO:key} key", Some(&disabled)));
        assert_eq!(" key", replace_sudo("%{SUDO:key} key", None));
    }

    #[test]
    fn test_enabled_policy_without_allow_list_drops_token() {
        let enabled = policy(true, &[]);
        assert_eq!(" key", replace_sudo("%{SUDO:key} key", Some(&enabled)));
    }

    #[test]
    fn test_allowed_command_gets_keyword() {
        let allowed = policy(true, &["key"]);
        assert_eq!("sudo key", replace_sudo("%{SUDO:key} key", Some(&allowed)));
        assert_eq!(
            "sudo key\nsudo key",
            replace_sudo("%{SUDO:key} key\n%{SUDO:key} key", Some(&allowed))
        );
    }

    #[test]
    fn test_token_match_is_case_insensitive() {
        let allowed = policy(true, &["NaviSecCli"]);
        assert_eq!(
            "sudo naviseccli -h",
            replace_sudo("%{Sudo:naviseccli} naviseccli -h", Some(&allowed))
        );
    }

    #[test]
    fn test_rewriting_is_idempotent() {
        let allowed = policy(true, &["key"]);
        let once = replace_sudo("%{SUDO:key} key %{SUDO:other} other", Some(&allowed));
        let twice = replace_sudo(&once, Some(&allowed));
        assert_eq!(once, twice);
        assert_eq!("sudo key  other", once);
    }

    #[test]
    fn test_blank_text_is_returned_as_is() {
        assert_eq!("", replace_sudo("", None));
        assert_eq!(" ", replace_sudo(" ", None));
        assert_eq!("text", replace_sudo("text", None));
    }

    #[test]
    fn test_file_name_extraction() {
        assert_eq!(
            Some("/usr/sbin/raidctl".to_string()),
            file_name_from_sudo_command("%{SUDO:/usr/sbin/raidctl} /usr/sbin/raidctl -S")
        );
        assert_eq!(None, file_name_from_sudo_command("/usr/sbin/raidctl -S"));
    }
}
