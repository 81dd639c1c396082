//! Side-effect records captured while a task runs.

use serde::{Deserialize, Serialize};

/// Output of a single executed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandArtifact {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandArtifact {
    /// Exit code / stderr convention used whenever a transport call is cut
    /// off by its timeout. Never raises: the caller decides severity.
    pub fn timed_out(command: impl Into<String>) -> Self {
        CommandArtifact {
            command: command.into(),
            stdout: String::new(),
            stderr: "Command timed out".to_string(),
            exit_code: 124,
        }
    }
}

/// A file snapshot, either text or binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileArtifact {
    pub filename: String,
    pub contents: FileContents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileContents {
    Text(String),
    Binary(Vec<u8>),
}

/// Union of the two artifact shapes the core persists; closed because the
/// engine (hooks, differ) needs to group and serialize artifacts without
/// dynamic typing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Artifact {
    Command(CommandArtifact),
    File(FileArtifact),
}

impl Artifact {
    pub fn class_name(&self) -> &'static str {
        match self {
            Artifact::Command(_) => "CommandArtifact",
            Artifact::File(_) => "FileArtifact",
        }
    }
}
