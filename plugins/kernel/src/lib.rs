//! `KernelPlugin`: reads and validates the running kernel version.
//!
//! Grounded in `original_source/errorscraper/plugins/inband/kernel/`.

use std::cell::Cell;

use nodescraper_api::{
    Connection, DataAnalyzer, DataCollector, DataModel, Event, EventCategory, EventPriority,
    ExecutionStatus, ImportableDataModel, OsFamily, SystemCompatibilityError, SystemInfo,
    SystemInteractionLevel, TaskResult,
};
use nodescraper_core::registry::{PluginDescriptor, PluginRegistry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type KernelPlugin = nodescraper_core::DataPlugin<KernelCollector, KernelAnalyzer>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelDataModel {
    pub kernel_version: String,
}

impl DataModel for KernelDataModel {
    fn model_name(&self) -> &'static str {
        "KernelDataModel"
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl ImportableDataModel for KernelDataModel {
    fn model_name_hint() -> &'static str {
        "KernelDataModel"
    }
}

/// Caches the `OsFamily` seen at `check_compatibility` time, since
/// `collect_data`'s shared signature doesn't carry `SystemInfo` directly and
/// the Windows/Linux command choice needs it.
#[derive(Default)]
pub struct KernelCollector {
    os_family: Cell<OsFamily>,
}

impl DataCollector for KernelCollector {
    type DataModel = KernelDataModel;
    type CollectArgs = ();

    const NAME: &'static str = "KernelCollector";

    fn check_compatibility(&self, system_info: &SystemInfo) -> Result<(), SystemCompatibilityError> {
        self.os_family.set(system_info.os_family);
        Ok(())
    }

    fn collect_data(
        &mut self,
        connection: &mut dyn Connection,
        interaction_level: SystemInteractionLevel,
        max_event_priority_level: EventPriority,
        _args: Option<Self::CollectArgs>,
        result: &mut TaskResult,
    ) -> anyhow::Result<Option<Self::DataModel>> {
        let windows = matches!(self.os_family.get(), OsFamily::Windows);
        let (command, sudo) = if windows {
            ("wmic os get Version /Value", false)
        } else {
            ("sh -c 'uname -r'", true)
        };

        let artifact = self.run_sut_cmd(
            connection,
            interaction_level,
            max_event_priority_level,
            command,
            sudo,
            None,
            true,
            result,
        )?;

        let kernel = if artifact.exit_code == 0 {
            if windows {
                artifact
                    .stdout
                    .lines()
                    .find(|line| line.contains("Version="))
                    .and_then(|line| line.split('=').nth(1))
                    .map(|s| s.trim().to_string())
            } else {
                Some(artifact.stdout.trim().to_string())
            }
        } else {
            None
        };

        if artifact.exit_code != 0 {
            let priority = EventPriority::Error.min(max_event_priority_level);
            if let Ok(event) = Event::new(
                Self::NAME,
                EventCategory::Os,
                "Error checking kernel version",
                json!({ "command": artifact.command, "exit_code": artifact.exit_code }),
                priority,
            ) {
                result.add_event(event);
            }
        }

        let data = kernel.as_ref().map(|version| {
            let model = KernelDataModel {
                kernel_version: version.clone(),
            };
            let priority = EventPriority::Info.min(max_event_priority_level);
            if let Ok(event) = Event::new(Self::NAME, EventCategory::Os, "Kernel version read", model.to_json(), priority) {
                result.add_event(event);
            }
            model
        });

        result.message = Some(match &kernel {
            Some(version) => format!("Kernel: {version}"),
            None => "Kernel not found".to_string(),
        });
        result.status = if kernel.is_some() { ExecutionStatus::Ok } else { ExecutionStatus::Error };

        Ok(data)
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }
    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => vec![s],
        StringOrList::Many(v) => v,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct KernelAnalyzerArgs {
    #[serde(default, deserialize_with = "string_or_list")]
    pub exp_kernel: Vec<String>,
    #[serde(default)]
    pub regex_match: bool,
}

#[derive(Default)]
pub struct KernelAnalyzer;

impl DataAnalyzer for KernelAnalyzer {
    type DataModel = KernelDataModel;
    type AnalyzeArgs = KernelAnalyzerArgs;

    const NAME: &'static str = "KernelAnalyzer";

    fn analyze_data(
        &mut self,
        data: &Self::DataModel,
        max_event_priority_level: EventPriority,
        args: Option<Self::AnalyzeArgs>,
        result: &mut TaskResult,
    ) -> anyhow::Result<()> {
        let Some(args) = args else {
            result.status = ExecutionStatus::NotRan;
            result.message = Some("Expected kernel not provided".to_string());
            return Ok(());
        };

        for kernel in &args.exp_kernel {
            let matched = if args.regex_match {
                match Regex::new(kernel) {
                    Ok(re) => re.find(&data.kernel_version).map(|m| m.start() == 0).unwrap_or(false),
                    Err(_) => {
                        let priority = EventPriority::Error.min(max_event_priority_level);
                        if let Ok(event) = Event::new(
                            Self::NAME,
                            EventCategory::Runtime,
                            "Kernel regex is invalid",
                            json!({ "regex": kernel }),
                            priority,
                        ) {
                            result.add_event(event);
                        }
                        continue;
                    }
                }
            } else {
                data.kernel_version == *kernel
            };

            if matched {
                result.status = ExecutionStatus::Ok;
                result.message = Some("Kernel matches expected".to_string());
                return Ok(());
            }
        }

        result.status = ExecutionStatus::Error;
        result.message = Some("Kernel mismatch!".to_string());
        let priority = EventPriority::Critical.min(max_event_priority_level);
        if let Ok(event) = Event::new(
            Self::NAME,
            EventCategory::Os,
            "Kernel mismatch!",
            json!({ "expected": args.exp_kernel, "actual": data.kernel_version }),
            priority,
        ) {
            result.add_event(event);
        }
        Ok(())
    }
}

pub fn register(registry: &mut PluginRegistry) {
    registry
        .register_plugin(PluginDescriptor {
            name: "KernelPlugin",
            connection_type: Some("InBandConnectionManager"),
            ctor: || {
                Box::new(
                    KernelPlugin::new("KernelPlugin", Some("InBandConnectionManager"))
                        .with_collector(KernelCollector::default())
                        .with_analyzer(KernelAnalyzer),
                )
            },
            data_model_name: "KernelDataModel",
            supported_os_family: &[OsFamily::Linux, OsFamily::Windows],
        })
        .expect("KernelPlugin always declares both a collector and an analyzer");
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescraper_api::{CommandArtifact, FileArtifact};
    use std::time::Duration;

    struct StubConnection {
        artifact: CommandArtifact,
    }

    impl Connection for StubConnection {
        fn run_command(&mut self, _command: &str, _timeout: Option<Duration>, _sudo: bool) -> anyhow::Result<CommandArtifact> {
            Ok(self.artifact.clone())
        }
        fn read_file(&mut self, _path: &str) -> anyhow::Result<FileArtifact> {
            unimplemented!("not exercised by these tests")
        }
    }

    fn run_collect(stdout: &str, exit_code: i32) -> (TaskResult, Option<KernelDataModel>) {
        let mut connection = StubConnection {
            artifact: CommandArtifact {
                command: "sh -c 'uname -r'".to_string(),
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code,
            },
        };
        let mut collector = KernelCollector::default();
        collector.os_family.set(OsFamily::Linux);
        let mut result = TaskResult::new(Some("KernelCollector".into()), Some("KernelPlugin".into()));
        let data = collector
            .collect_data(&mut connection, SystemInteractionLevel::Standard, EventPriority::Critical, None, &mut result)
            .unwrap();
        (result, data)
    }

    #[test]
    fn s1_local_probe_all_green() {
        let (result, data) = run_collect("5.4.0-88-generic\n", 0);
        assert_eq!(result.status, ExecutionStatus::Ok);
        let data = data.unwrap();
        assert_eq!(data.kernel_version, "5.4.0-88-generic");

        let mut analyzer = KernelAnalyzer;
        let mut analysis = TaskResult::new(Some("KernelAnalyzer".into()), Some("KernelPlugin".into()));
        analyzer
            .analyze_data(
                &data,
                EventPriority::Critical,
                Some(KernelAnalyzerArgs {
                    exp_kernel: vec!["5.4.0-88-generic".to_string()],
                    regex_match: false,
                }),
                &mut analysis,
            )
            .unwrap();
        assert_eq!(analysis.status, ExecutionStatus::Ok);
    }

    #[test]
    fn s2_kernel_mismatch() {
        let (_, data) = run_collect("5.4.0-88-generic\n", 0);
        let data = data.unwrap();

        let mut analyzer = KernelAnalyzer;
        let mut analysis = TaskResult::new(Some("KernelAnalyzer".into()), Some("KernelPlugin".into()));
        analyzer
            .analyze_data(
                &data,
                EventPriority::Critical,
                Some(KernelAnalyzerArgs {
                    exp_kernel: vec!["99.99".to_string()],
                    regex_match: false,
                }),
                &mut analysis,
            )
            .unwrap();
        assert_eq!(analysis.status, ExecutionStatus::Error);
        assert_eq!(analysis.events.len(), 1);
        assert_eq!(analysis.events[0].priority, EventPriority::Critical);
        assert_eq!(analysis.events[0].category, EventCategory::Os);
        assert!(analysis.message.unwrap().contains("mismatch"));
    }

    #[test]
    fn collector_reports_error_on_nonzero_exit() {
        let (result, data) = run_collect("", 1);
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(data.is_none());
        assert_eq!(result.events.len(), 1);
    }

    #[test]
    fn analyzer_not_ran_without_args() {
        let data = KernelDataModel { kernel_version: "5.4.0".to_string() };
        let mut analyzer = KernelAnalyzer;
        let mut result = TaskResult::new(None, None);
        analyzer.analyze_data(&data, EventPriority::Critical, None, &mut result).unwrap();
        assert_eq!(result.status, ExecutionStatus::NotRan);
    }

    #[test]
    fn kernel_data_model_round_trips_through_log_model() {
        let dir = tempfile::tempdir().unwrap();
        let original = KernelDataModel { kernel_version: "5.4.0-88-generic".to_string() };
        original.log_model(dir.path()).unwrap();

        let imported = KernelDataModel::import_model(dir.path()).unwrap();
        assert_eq!(imported, original);
    }
}
