//! Owns the lifecycle of a single in-band connection (local or SSH),
//! including the one-time OS family probe on first connect.

use std::sync::Arc;
use std::time::Duration;

use nodescraper_api::{
    Artifact, Connection, ConnectionManager, Event, EventCategory, EventPriority, ExecutionStatus,
    OsFamily, SystemInfo, TaskResult, TaskResultHook,
};
use serde_json::json;

use super::local::LocalShell;
use super::remote::{RemoteShell, SshConnectionParams};

#[derive(Debug, Clone)]
pub enum InBandTarget {
    Local,
    Remote(SshConnectionParams),
}

pub struct InBandConnectionManager {
    target: InBandTarget,
    connection: Option<Box<dyn Connection>>,
    result: Option<TaskResult>,
    hooks: Arc<Vec<Box<dyn TaskResultHook>>>,
}

impl InBandConnectionManager {
    pub fn new(target: InBandTarget, hooks: Arc<Vec<Box<dyn TaskResultHook>>>) -> Self {
        InBandConnectionManager {
            target,
            connection: None,
            result: None,
            hooks,
        }
    }

    fn establish(&self, system_info: &mut SystemInfo, result: &mut TaskResult) -> anyhow::Result<Box<dyn Connection>> {
        let mut connection: Box<dyn Connection> = match &self.target {
            InBandTarget::Local => Box::new(LocalShell::new()),
            InBandTarget::Remote(params) => Box::new(RemoteShell::connect(params.clone())?),
        };
        probe_os_family(connection.as_mut(), system_info, result)?;
        Ok(connection)
    }
}

fn probe_os_family(
    connection: &mut dyn Connection,
    system_info: &mut SystemInfo,
    result: &mut TaskResult,
) -> anyhow::Result<()> {
    let artifact = connection.run_command("uname -s", Some(Duration::from_secs(10)), false)?;
    let stdout = artifact.stdout.trim().to_string();
    let exit_code = artifact.exit_code;
    result.add_artifact(Artifact::Command(artifact));

    system_info.os_family = if exit_code != 0 {
        OsFamily::Windows
    } else if stdout.eq_ignore_ascii_case("linux") {
        OsFamily::Linux
    } else {
        result.add_event(Event::new(
            "connection_manager",
            EventCategory::Os,
            format!("unrecognized uname -s output: {stdout:?}"),
            json!({}),
            EventPriority::Warning,
        )?);
        OsFamily::Unknown
    };
    Ok(())
}

impl ConnectionManager for InBandConnectionManager {
    fn connect(&mut self, system_info: &mut SystemInfo) -> TaskResult {
        // Connect-once: a prior result, successful or not, is never retried.
        if let Some(result) = &self.result {
            return result.clone();
        }

        let mut result = TaskResult::new(Some("InBandConnectionManager".to_string()), None);
        match self.establish(system_info, &mut result) {
            Ok(connection) => {
                self.connection = Some(connection);
            }
            Err(err) => {
                let event = Event::new(
                    "connection_manager",
                    EventCategory::Ssh,
                    format!("connect failed: {err:#}"),
                    json!({}),
                    EventPriority::Critical,
                )
                .expect("engine-constructed event respects size caps");
                result.add_event(event);
                result.status = ExecutionStatus::ExecutionFailure;
            }
        }
        result.finalize();
        for hook in self.hooks.iter() {
            if let Err(err) = hook.process_result(&mut result, None) {
                tracing::warn!(error = %err, "connection manager hook failed");
            }
        }
        self.result = Some(result.clone());
        result
    }

    fn disconnect(&mut self) {
        self.connection = None;
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn result(&self) -> Option<&TaskResult> {
        self.result.as_ref()
    }

    fn connection_mut(&mut self) -> Option<&mut dyn Connection> {
        self.connection.as_deref_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescraper_api::SystemLocation;

    #[test]
    fn local_connect_probes_linux_and_succeeds() {
        let mut manager = InBandConnectionManager::new(InBandTarget::Local, Arc::new(Vec::new()));
        let mut system_info = SystemInfo::new("host", SystemLocation::Local);
        let result = manager.connect(&mut system_info);
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert!(manager.is_connected());
    }

    #[test]
    fn connect_is_idempotent_after_first_call() {
        let mut manager = InBandConnectionManager::new(InBandTarget::Local, Arc::new(Vec::new()));
        let mut system_info = SystemInfo::new("host", SystemLocation::Local);
        let first = manager.connect(&mut system_info);
        let second = manager.connect(&mut system_info);
        assert_eq!(first.start_time, second.start_time);
    }

    #[test]
    fn disconnect_is_safe_when_never_connected() {
        let mut manager = InBandConnectionManager::new(InBandTarget::Local, Arc::new(Vec::new()));
        manager.disconnect();
        assert!(!manager.is_connected());
    }
}
