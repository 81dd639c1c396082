//! Runs commands via a local child process; reads files from the local
//! filesystem.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nodescraper_api::{CommandArtifact, Connection, FileArtifact, FileContents};

pub struct LocalShell;

impl LocalShell {
    pub fn new() -> Self {
        LocalShell
    }
}

impl Default for LocalShell {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for LocalShell {
    fn run_command(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
        sudo: bool,
    ) -> anyhow::Result<CommandArtifact> {
        let full_command = if sudo {
            format!("sudo -n sh -c '{command}'")
        } else {
            command.to_string()
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&full_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let start = Instant::now();
        let timeout = timeout.unwrap_or(Duration::from_secs(60));
        loop {
            if let Some(status) = child.try_wait()? {
                let mut stdout = String::new();
                let mut stderr = String::new();
                if let Some(mut out) = child.stdout.take() {
                    out.read_to_string(&mut stdout).ok();
                }
                if let Some(mut err) = child.stderr.take() {
                    err.read_to_string(&mut stderr).ok();
                }
                return Ok(CommandArtifact {
                    command: full_command,
                    stdout,
                    stderr,
                    exit_code: status.code().unwrap_or(-1),
                });
            }
            if start.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(CommandArtifact::timed_out(full_command));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    fn read_file(&mut self, path: &str) -> anyhow::Result<FileArtifact> {
        let bytes = std::fs::read(path)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_captures_stdout_and_exit_code() {
        let mut shell = LocalShell::new();
        let artifact = shell.run_command("echo hello", None, false).unwrap();
        assert_eq!(artifact.stdout.trim(), "hello");
        assert_eq!(artifact.exit_code, 0);
    }

    #[test]
    fn run_command_times_out() {
        let mut shell = LocalShell::new();
        let artifact = shell
            .run_command("sleep 5", Some(Duration::from_millis(50)), false)
            .unwrap();
        assert_eq!(artifact.exit_code, 124);
        assert_eq!(artifact.stderr, "Command timed out");
    }

    #[test]
    fn read_file_returns_text_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "hi").unwrap();
        let mut shell = LocalShell::new();
        let artifact = shell.read_file(path.to_str().unwrap()).unwrap();
        match artifact.contents {
            FileContents::Text(text) => assert_eq!(text, "hi"),
            FileContents::Binary(_) => panic!("expected text contents"),
        }
    }
}
