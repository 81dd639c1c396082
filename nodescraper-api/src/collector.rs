//! Produces a typed [`DataModel`] by interacting with the target system.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::artifact::Artifact;
use crate::connection::Connection;
use crate::data_model::DataModel;
use crate::enums::{EventCategory, EventPriority, OsFamily, SystemInteractionLevel};
use crate::errors::SystemCompatibilityError;
use crate::event::Event;
use crate::system_info::SystemInfo;
use crate::task_result::TaskResult;

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Generic in its emitted [`DataModel`] and its own argument type, preserved
/// as real Rust generics (not an `interface{}` + downcast escape hatch)
/// since the language supports it directly.
pub trait DataCollector: Send {
    type DataModel: DataModel;
    type CollectArgs: DeserializeOwned + Default + Send;

    /// Stable identifier used as the `TaskResult.task` value and in the
    /// filesystem log hook's directory naming.
    const NAME: &'static str;
    const TASK_TYPE: &'static str = "DATA_COLLECTOR";

    /// Declared support sets. An empty slice means "no restriction" (the
    /// collector runs regardless of that axis).
    fn supported_os_family(&self) -> &[OsFamily] {
        &[]
    }
    fn supported_skus(&self) -> &[String] {
        &[]
    }
    fn supported_platforms(&self) -> &[String] {
        &[]
    }

    /// Construction-time compatibility check. The owning plugin converts a
    /// returned error into a `NOT_RAN` result rather than a failure.
    fn check_compatibility(&self, system_info: &SystemInfo) -> Result<(), SystemCompatibilityError> {
        if !system_info.supports_os_family(self.supported_os_family()) {
            return Err(SystemCompatibilityError::UnsupportedOsFamily(system_info.os_family));
        }
        if !system_info.supports_sku(self.supported_skus()) {
            return Err(SystemCompatibilityError::UnsupportedSku(
                system_info.sku.clone().unwrap_or_default(),
            ));
        }
        if !system_info.supports_platform(self.supported_platforms()) {
            return Err(SystemCompatibilityError::UnsupportedPlatform(
                system_info.platform.clone().unwrap_or_default(),
            ));
        }
        Ok(())
    }

    /// Inner collection body. The uniform error-boundary/finalize contract
    /// lives in the `run_task` middleware (`nodescraper-core`), not here:
    /// this method may return `Err` freely and the middleware converts it
    /// into a CRITICAL RUNTIME event plus `EXECUTION_FAILURE`.
    fn collect_data(
        &mut self,
        connection: &mut dyn Connection,
        interaction_level: SystemInteractionLevel,
        max_event_priority_level: EventPriority,
        args: Option<Self::CollectArgs>,
        result: &mut TaskResult,
    ) -> anyhow::Result<Option<Self::DataModel>>;

    /// Runs a command against the connected system, recording it as a
    /// `CommandArtifact` on `result` unless `log_artifact` is false.
    ///
    /// A `sudo` command issued while the plugin's interaction level is
    /// `SURFACE` is refused outright rather than executed: `SURFACE` means
    /// read-only/non-invasive by declaration, so a privileged command at
    /// that level is a programming error in the collector, not a transport
    /// failure. The refusal is logged as a WARNING event (capped at
    /// `max_event_priority_level`) and reported back as a synthetic
    /// non-zero-exit artifact instead of an `Err`, so the collector can
    /// keep its normal success/failure branching.
    #[allow(clippy::too_many_arguments)]
    fn run_sut_cmd(
        &self,
        connection: &mut dyn Connection,
        interaction_level: SystemInteractionLevel,
        max_event_priority_level: EventPriority,
        command: &str,
        sudo: bool,
        timeout: Option<Duration>,
        log_artifact: bool,
        result: &mut TaskResult,
    ) -> anyhow::Result<crate::artifact::CommandArtifact> {
        if sudo && interaction_level == SystemInteractionLevel::Surface {
            let priority = EventPriority::Warning.min(max_event_priority_level);
            if let Ok(event) = Event::new(
                Self::NAME,
                EventCategory::Runtime,
                format!("refused to run privileged command at SURFACE interaction level: {command}"),
                json!({ "command": command }),
                priority,
            ) {
                result.add_event(event);
            }
            let artifact = crate::artifact::CommandArtifact {
                command: command.to_string(),
                stdout: String::new(),
                stderr: "blocked: sudo command at SURFACE interaction level".to_string(),
                exit_code: 126,
            };
            if log_artifact {
                result.add_artifact(Artifact::Command(artifact.clone()));
            }
            return Ok(artifact);
        }

        let timeout = timeout.or(Some(Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)));
        let artifact = connection.run_command(command, timeout, sudo)?;
        if log_artifact {
            result.add_artifact(Artifact::Command(artifact.clone()));
        }
        Ok(artifact)
    }

    /// Reads a file from the connected system, recording it as a
    /// `FileArtifact` on `result` unless `log_artifact` is false.
    fn read_sut_file(
        &self,
        connection: &mut dyn Connection,
        path: &str,
        log_artifact: bool,
        result: &mut TaskResult,
    ) -> anyhow::Result<crate::artifact::FileArtifact> {
        let artifact = connection.read_file(path)?;
        if log_artifact {
            result.add_artifact(Artifact::File(artifact.clone()));
        }
        Ok(artifact)
    }
}
