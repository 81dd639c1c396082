//! SSH-backed connection to a remote target.
//!
//! Uses `ssh2` (a synchronous libssh2 wrapper) rather than an async SSH
//! stack: the executor's scheduling model (`spec.md` §5) is single-threaded
//! and cooperative, with no async runtime, so a blocking transport is the
//! better fit than pulling in `tokio` for one crate's sake.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use nodescraper_api::{CommandArtifact, Connection, FileArtifact, FileContents};
use serde::{Deserialize, Serialize};
use ssh2::Session;

/// Connection parameters for an SSH target. Mirrors
/// `original_source/errorscraper/connection/inband/sshparams.py`: a
/// hostname (IP or resolvable name), optional password and/or private key,
/// and a port restricted to the valid TCP range, defaulting to 22.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConnectionParams {
    pub hostname: String,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub port: u16,
}

impl SshConnectionParams {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        SshConnectionParams {
            hostname: hostname.into(),
            username: username.into(),
            password: None,
            private_key_path: None,
            port: 22,
        }
    }
}

pub struct RemoteShell {
    session: Session,
    params: SshConnectionParams,
}

impl RemoteShell {
    pub fn connect(params: SshConnectionParams) -> anyhow::Result<Self> {
        let tcp = TcpStream::connect((params.hostname.as_str(), params.port))?;
        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;

        if let Some(key_path) = &params.private_key_path {
            session.userauth_pubkey_file(&params.username, None, std::path::Path::new(key_path), None)?;
        } else if let Some(password) = &params.password {
            session.userauth_password(&params.username, password)?;
        } else {
            anyhow::bail!("no password or private key supplied for {}", params.hostname);
        }

        if !session.authenticated() {
            anyhow::bail!("ssh authentication failed for {}@{}", params.username, params.hostname);
        }

        Ok(RemoteShell { session, params })
    }

    fn sudo_password(&self) -> Option<&str> {
        self.params.password.as_deref()
    }
}

impl Connection for RemoteShell {
    fn run_command(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
        sudo: bool,
    ) -> anyhow::Result<CommandArtifact> {
        let timeout = timeout.unwrap_or(Duration::from_secs(60));
        self.session.set_timeout(timeout.as_millis() as u32);

        let mut channel = self.session.channel_session()?;

        let (full_command, stdin_password) = if sudo {
            let has_password = self.sudo_password().is_some();
            if has_password {
                (format!("sudo -S -p '' sh -c '{command}'"), self.sudo_password().map(str::to_string))
            } else {
                (format!("sudo -n sh -c '{command}'"), None)
            }
        } else {
            (command.to_string(), None)
        };

        let exec_result = channel.exec(&full_command).and_then(|()| {
            if let Some(password) = &stdin_password {
                channel.write_all(format!("{password}\n").as_bytes())?;
            }
            let mut stdout = String::new();
            let mut stderr = String::new();
            channel.read_to_string(&mut stdout)?;
            channel.stderr().read_to_string(&mut stderr)?;
            channel.wait_close()?;
            let exit_code = channel.exit_status()?;
            Ok((stdout, stderr, exit_code))
        });

        match exec_result {
            Ok((stdout, stderr, exit_code)) => Ok(CommandArtifact {
                command: full_command,
                stdout,
                stderr,
                exit_code,
            }),
            Err(err) if is_timeout(&err) => Ok(CommandArtifact::timed_out(full_command)),
            Err(err) => Err(err.into()),
        }
    }

    fn read_file(&mut self, path: &str) -> anyhow::Result<FileArtifact> {
        let sftp = self.session.sftp()?;
        let mut remote_file = sftp.open(std::path::Path::new(path))?;
        let mut bytes = Vec::new();
        remote_file.read_to_end(&mut bytes)?;
        let filename = std::path::Path::new(path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(path)
            .to_string();
        let contents = match String::from_utf8(bytes.clone()) {
            Ok(text) => FileContents::Text(text),
            Err(_) => FileContents::Binary(bytes),
        };
        Ok(FileArtifact { filename, contents })
    }
}

fn is_timeout(err: &ssh2::Error) -> bool {
    err.code() == ssh2::ErrorCode::Session(-21) // LIBSSH2_ERROR_TIMEOUT
}
