// Bundled ssh2-backed remote executor.
//
// The whole exchange runs on the blocking pool: connect with a deadline,
// authenticate, SCP the local files to the remote temp directory, execute
// the command with uploaded paths rewritten to their remote locations,
// capture stdout, then remove the uploaded files and disconnect.

use async_trait::async_trait;
use ssh2::Session;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command_execution::error::{CommandError, CommandResult};
use crate::command_execution::macros::replace_case_insensitive;
use crate::command_execution::protocol::ssh::RemoteSshExecutor;

/// Remote directory the uploaded files land in
const SSH_REMOTE_DIRECTORY: &str = "/var/tmp/";

/// Mode of the uploaded files
const SSH_FILE_MODE: i32 = 0o700;

/// libssh2 session error raised when an operation exceeds the socket timeout
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// ssh2-backed implementation of [`RemoteSshExecutor`]
#[derive(Debug, Clone, Default)]
pub struct Ssh2Executor;

impl Ssh2Executor {
    pub fn new() -> Self {
        Self
    }
}

struct SshRequest {
    hostname: String,
    username: String,
    password: Option<String>,
    private_key: Option<PathBuf>,
    port: u16,
    command: String,
    timeout: Duration,
    local_files: Vec<PathBuf>,
    display_command: String,
}

#[async_trait]
impl RemoteSshExecutor for Ssh2Executor {
    async fn run(
        &self,
        hostname: &str,
        username: &str,
        password: Option<&str>,
        private_key: Option<&Path>,
        port: u16,
        command: &str,
        timeout: Duration,
        local_files: &[PathBuf],
        display_command: &str,
    ) -> CommandResult<String> {
        let request = SshRequest {
            hostname: hostname.to_string(),
            username: username.to_string(),
            password: password.map(str::to_string),
            private_key: private_key.map(Path::to_path_buf),
            port,
            command: command.to_string(),
            timeout,
            local_files: local_files.to_vec(),
            display_command: display_command.to_string(),
        };

        tokio::task::spawn_blocking(move || run_blocking(request))
            .await
            .map_err(|error| CommandError::transport(format!("SSH task failed: {error}")))?
    }
}

fn run_blocking(request: SshRequest) -> CommandResult<String> {
    log::debug!(
        "Hostname {} - Executing remote SSH command as {}: {}",
        request.hostname,
        request.username,
        request.display_command
    );

    let session = open_session(&request)?;
    let uploads = upload_files(&session, &request.local_files)?;

    let command = rewrite_uploaded_paths(&request.command, &uploads);
    let display_command = rewrite_uploaded_paths(&request.display_command, &uploads);

    let result = execute(&session, &command, &display_command, request.timeout);
    remove_remote_files(&session, &request.hostname, &uploads);
    let _ = session.disconnect(None, "command finished", None);
    result
}

fn open_session(request: &SshRequest) -> CommandResult<Session> {
    let address = (request.hostname.as_str(), request.port)
        .to_socket_addrs()
        .map_err(|error| {
            CommandError::transport(format!(
                "Cannot resolve {}:{}: {error}",
                request.hostname, request.port
            ))
        })?
        .next()
        .ok_or_else(|| {
            CommandError::transport(format!(
                "Cannot resolve {}:{}",
                request.hostname, request.port
            ))
        })?;

    let tcp = TcpStream::connect_timeout(&address, request.timeout).map_err(|error| {
        CommandError::transport(format!(
            "Failed to connect to {}:{}: {error}",
            request.hostname, request.port
        ))
    })?;

    let mut session =
        Session::new().map_err(|error| CommandError::transport(error.to_string()))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(request.timeout.as_millis() as u32);
    session.handshake().map_err(|error| {
        CommandError::transport(format!(
            "SSH handshake with {} failed: {error}",
            request.hostname
        ))
    })?;

    authenticate(&session, request)?;
    Ok(session)
}

/// Authenticate with the private key when one is configured (the password
/// doubling as its passphrase), else with the password, else through the
/// agent
fn authenticate(session: &Session, request: &SshRequest) -> CommandResult<()> {
    let outcome = if let Some(key) = &request.private_key {
        session.userauth_pubkey_file(&request.username, None, key, request.password.as_deref())
    } else if let Some(password) = request.password.as_deref().filter(|p| !p.is_empty()) {
        session.userauth_password(&request.username, password)
    } else {
        log::debug!(
            "Hostname {} - No password configured, trying agent authentication",
            request.hostname
        );
        session.userauth_agent(&request.username)
    };

    outcome.map_err(|error| {
        CommandError::transport(format!(
            "Authentication as {} on {} failed: {error}",
            request.username, request.hostname
        ))
    })?;

    if !session.authenticated() {
        return Err(CommandError::transport(format!(
            "Authentication as {} on {} failed",
            request.username, request.hostname
        )));
    }
    Ok(())
}

fn upload_files(
    session: &Session,
    local_files: &[PathBuf],
) -> CommandResult<Vec<(PathBuf, String)>> {
    let mut uploads = Vec::new();
    for local in local_files {
        let name = local
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                CommandError::invalid_input(format!(
                    "local file {} has no usable name",
                    local.display()
                ))
            })?;
        let data = std::fs::read(local)?;
        let remote = format!("{SSH_REMOTE_DIRECTORY}{name}");

        let scp_error =
            |error: String| CommandError::transport(format!("SCP upload of {name} failed: {error}"));

        let mut channel = session
            .scp_send(Path::new(&remote), SSH_FILE_MODE, data.len() as u64, None)
            .map_err(|e| scp_error(e.to_string()))?;
        channel
            .write_all(&data)
            .map_err(|e| scp_error(e.to_string()))?;
        channel.send_eof().map_err(|e| scp_error(e.to_string()))?;
        channel.wait_eof().map_err(|e| scp_error(e.to_string()))?;
        channel.close().map_err(|e| scp_error(e.to_string()))?;
        channel.wait_close().map_err(|e| scp_error(e.to_string()))?;

        uploads.push((local.clone(), remote));
    }
    Ok(uploads)
}

/// Point the command at the remote copies of the uploaded files
fn rewrite_uploaded_paths(command: &str, uploads: &[(PathBuf, String)]) -> String {
    uploads.iter().fold(
        command.to_string(),
        |rewritten, (local, remote)| {
            replace_case_insensitive(&rewritten, &local.to_string_lossy(), remote)
        },
    )
}

fn execute(
    session: &Session,
    command: &str,
    display_command: &str,
    timeout: Duration,
) -> CommandResult<String> {
    let mut channel = session
        .channel_session()
        .map_err(|error| ssh_error(error, display_command, timeout))?;
    channel
        .exec(command)
        .map_err(|error| ssh_error(error, display_command, timeout))?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|error| io_ssh_error(error, display_command, timeout))?;

    let mut stderr = String::new();
    let _ = channel.stderr().read_to_string(&mut stderr);
    let _ = channel.wait_close();
    let status = channel
        .exit_status()
        .map_err(|error| ssh_error(error, display_command, timeout))?;

    if status != 0 {
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(CommandError::transport(format!(
            "Command \"{display_command}\" failed with status {status}: {detail}"
        )));
    }

    Ok(stdout.replace("\r\n", "\n").trim_end_matches('\n').to_string())
}

fn remove_remote_files(session: &Session, hostname: &str, uploads: &[(PathBuf, String)]) {
    if uploads.is_empty() {
        return;
    }
    let paths = uploads
        .iter()
        .map(|(_, remote)| remote.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    log::debug!("Hostname {hostname} - Removing remote files {paths}");

    let removal = session.channel_session().and_then(|mut channel| {
        channel.exec(&format!("rm -f {paths}"))?;
        channel.wait_close()
    });
    if let Err(error) = removal {
        log::warn!("Hostname {hostname} - Failed to remove remote files {paths}: {error}");
    }
}

fn ssh_error(error: ssh2::Error, display_command: &str, timeout: Duration) -> CommandError {
    match error.code() {
        ssh2::ErrorCode::Session(code) if code == LIBSSH2_ERROR_TIMEOUT => {
            CommandError::timeout(display_command, timeout)
        }
        _ => CommandError::transport(error.to_string()),
    }
}

fn io_ssh_error(error: std::io::Error, display_command: &str, timeout: Duration) -> CommandError {
    match error.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            CommandError::timeout(display_command, timeout)
        }
        _ => CommandError::transport(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploaded_paths_are_rewritten_case_insensitively() {
        let uploads = vec![(
            PathBuf::from("/tmp/Mihari_Embedded_0001.sh"),
            format!("{SSH_REMOTE_DIRECTORY}Mihari_Embedded_0001.sh"),
        )];
        let rewritten =
            rewrite_uploaded_paths("/bin/sh /tmp/mihari_embedded_0001.sh", &uploads);
        assert_eq!("/bin/sh /var/tmp/Mihari_Embedded_0001.sh", rewritten);
    }

    #[test]
    fn test_rewrite_without_uploads_is_identity() {
        assert_eq!("uname -r", rewrite_uploaded_paths("uname -r", &[]));
    }
}
