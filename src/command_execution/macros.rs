// Macro token substitution for command templates.
//
// Tokens are matched case-insensitively as whole `%{...}` tokens. Every
// substitution produces two variants: one with the real password for
// execution, one with the password masked for logging and display.

use regex::{NoExpand, Regex};

/// Username macro token
pub const USERNAME_MACRO: &str = "%{USERNAME}";

/// Password macro token
pub const PASSWORD_MACRO: &str = "%{PASSWORD}";

/// Hostname macro token
pub const HOSTNAME_MACRO: &str = "%{HOSTNAME}";

/// Mask substituted for the password in display commands
pub const PASSWORD_MASK: &str = "********";

/// Compile a case-insensitive pattern matching the given literal text
pub fn case_insensitive_pattern(literal: &str) -> Regex {
    Regex::new(&format!("(?i){}", regex::escape(literal)))
        .expect("escaped literal is a valid pattern")
}

/// Replace every case-insensitive occurrence of `literal` with
/// `replacement`, taken literally (no capture group expansion)
pub fn replace_case_insensitive(text: &str, literal: &str, replacement: &str) -> String {
    case_insensitive_pattern(literal)
        .replace_all(text, NoExpand(replacement))
        .into_owned()
}

/// A command resolved for execution, with its password-masked counterpart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Command handed to the dispatcher, real password included
    pub command: String,
    /// Same command with the password masked, safe to log and return
    pub display: String,
}

/// Substitute the username, password and hostname macros into a command
/// template. A `None` username or password leaves the corresponding token
/// unexpanded.
pub fn substitute_macros(
    template: &str,
    username: Option<&str>,
    password: Option<&str>,
    hostname: &str,
) -> ResolvedCommand {
    let mut command = template.to_string();
    if let Some(username) = username {
        command = replace_case_insensitive(&command, USERNAME_MACRO, username);
    }
    command = replace_case_insensitive(&command, HOSTNAME_MACRO, hostname);

    match password {
        Some(password) => ResolvedCommand {
            display: replace_case_insensitive(&command, PASSWORD_MACRO, PASSWORD_MASK),
            command: replace_case_insensitive(&command, PASSWORD_MACRO, password),
        },
        None => ResolvedCommand {
            display: command.clone(),
            command,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_without_macros_is_unchanged() {
        let resolved = substitute_macros("uname -r", Some("user"), Some("pwd"), "host");
        assert_eq!("uname -r", resolved.command);
        assert_eq!("uname -r", resolved.display);
    }

    #[test]
    fn test_substitution_is_case_insensitive() {
        let upper = substitute_macros("run -u %{USERNAME}", Some("user"), None, "host");
        let mixed = substitute_macros("run -u %{UserName}", Some("user"), None, "host");
        assert_eq!(upper.command, mixed.command);
        assert_eq!("run -u user", upper.command);
    }

    #[test]
    fn test_password_is_masked_in_display_only() {
        let resolved = substitute_macros(
            "tool -User %{USERNAME} -Password %{PASSWORD} -Address %{HOSTNAME}",
            Some("user"),
            Some("secret"),
            "host",
        );
        assert_eq!("tool -User user -Password secret -Address host", resolved.command);
        assert_eq!(
            "tool -User user -Password ******** -Address host",
            resolved.display
        );
        assert_eq!(
            resolved.command.replace("secret", PASSWORD_MASK),
            resolved.display
        );
    }

    #[test]
    fn test_missing_values_leave_tokens_unexpanded() {
        let resolved = substitute_macros("run %{USERNAME} %{PASSWORD}", None, None, "host");
        assert_eq!("run %{USERNAME} %{PASSWORD}", resolved.command);
        assert_eq!(resolved.command, resolved.display);
    }

    #[test]
    fn test_replacement_text_is_literal() {
        // `$` in the replacement must not be treated as a group reference.
        let resolved = substitute_macros("echo %{PASSWORD}", None, Some("a$1b"), "host");
        assert_eq!("echo a$1b", resolved.command);
    }
}
