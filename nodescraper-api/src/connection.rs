//! Uniform command/file interface to a target system, and the lifecycle
//! that owns one such connection.

use std::time::Duration;

use crate::artifact::{CommandArtifact, FileArtifact};
use crate::system_info::SystemInfo;
use crate::task_result::TaskResult;

/// A single transport to a target system. Implemented by `LocalShell` and
/// `RemoteShell` in `nodescraper-core`.
pub trait Connection: Send {
    /// Runs `command` with an optional per-call timeout, optionally via
    /// `sudo`. Never returns `Err` for a non-zero exit or a timeout — both
    /// are reported through the returned artifact so collectors can decide
    /// severity themselves; `Err` is reserved for transport-level failure
    /// (e.g. the SSH channel itself dropped).
    fn run_command(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
        sudo: bool,
    ) -> anyhow::Result<CommandArtifact>;

    fn read_file(&mut self, path: &str) -> anyhow::Result<FileArtifact>;
}

/// Owns the lifecycle of one [`Connection`] to one target system.
///
/// `connect()` is idempotent and must be called at most once per instance
/// per run (the connect-once invariant): a second call when already
/// connected is a no-op that returns the prior `OK` result without
/// re-probing the transport.
pub trait ConnectionManager: Send {
    fn connect(&mut self, system_info: &mut SystemInfo) -> TaskResult;

    /// Safe to call when already disconnected.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// `None` until `connect()` has been called at least once.
    fn result(&self) -> Option<&TaskResult>;

    /// Exposes the live transport for collectors. `None` when not connected.
    fn connection_mut(&mut self) -> Option<&mut dyn Connection>;
}
