//! `CmdlinePlugin`: reads and validates the kernel boot cmdline.
//!
//! Grounded in `original_source/errorscraper/plugins/inband/cmdline/`.

use nodescraper_api::{
    Connection, DataAnalyzer, DataCollector, DataModel, Event, EventCategory, EventPriority,
    ExecutionStatus, ImportableDataModel, OsFamily, SystemInteractionLevel, TaskResult,
};
use nodescraper_core::registry::{PluginDescriptor, PluginRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type CmdlinePlugin = nodescraper_core::DataPlugin<CmdlineCollector, CmdlineAnalyzer>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdlineDataModel {
    pub cmdline: String,
}

impl DataModel for CmdlineDataModel {
    fn model_name(&self) -> &'static str {
        "CmdlineDataModel"
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl ImportableDataModel for CmdlineDataModel {
    fn model_name_hint() -> &'static str {
        "CmdlineDataModel"
    }
}

#[derive(Default)]
pub struct CmdlineCollector;

impl DataCollector for CmdlineCollector {
    type DataModel = CmdlineDataModel;
    type CollectArgs = ();

    const NAME: &'static str = "CmdlineCollector";

    fn supported_os_family(&self) -> &[OsFamily] {
        &[OsFamily::Linux]
    }

    fn collect_data(
        &mut self,
        connection: &mut dyn Connection,
        interaction_level: SystemInteractionLevel,
        max_event_priority_level: EventPriority,
        _args: Option<Self::CollectArgs>,
        result: &mut TaskResult,
    ) -> anyhow::Result<Option<Self::DataModel>> {
        let artifact = self.run_sut_cmd(
            connection,
            interaction_level,
            max_event_priority_level,
            "cat /proc/cmdline",
            false,
            None,
            true,
            result,
        )?;

        if artifact.exit_code == 0 {
            let model = CmdlineDataModel {
                cmdline: artifact.stdout.clone(),
            };
            let priority = EventPriority::Info.min(max_event_priority_level);
            if let Ok(event) = Event::new(Self::NAME, EventCategory::Os, "cmdline read", model.to_json(), priority) {
                result.add_event(event);
            }
            result.message = Some(format!("cmdline: {}", artifact.stdout));
            result.status = ExecutionStatus::Ok;
            Ok(Some(model))
        } else {
            let priority = EventPriority::Error.min(max_event_priority_level);
            if let Ok(event) = Event::new(
                Self::NAME,
                EventCategory::Os,
                "Error checking cmdline",
                json!({ "command": artifact.command, "exit_code": artifact.exit_code }),
                priority,
            ) {
                result.add_event(event);
            }
            result.message = Some("cmdline not found".to_string());
            result.status = ExecutionStatus::Error;
            Ok(None)
        }
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
pub struct CmdlineAnalyzerArgs {
    #[serde(default, deserialize_with = "string_or_list")]
    pub required_cmdline: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub banned_cmdline: Vec<String>,
}

#[derive(Default)]
pub struct CmdlineAnalyzer;

impl CmdlineAnalyzer {
    fn compare_cmdline(
        &self,
        cmdline: &str,
        required: &[String],
        banned: &[String],
        max_event_priority_level: EventPriority,
        result: &mut TaskResult,
    ) -> bool {
        let missing_required: Vec<&String> = required.iter().filter(|arg| !cmdline.contains(arg.as_str())).collect();
        let found_banned: Vec<&String> = banned.iter().filter(|arg| cmdline.contains(arg.as_str())).collect();

        if !missing_required.is_empty() {
            let priority = EventPriority::Error.min(max_event_priority_level);
            if let Ok(event) = Event::new(
                Self::NAME,
                EventCategory::Os,
                format!("Missing {} required kernel cmdline arguments", missing_required.len()),
                json!({ "missing_required": missing_required }),
                priority,
            ) {
                result.add_event(event);
            }
        }

        if !found_banned.is_empty() {
            let priority = EventPriority::Error.min(max_event_priority_level);
            if let Ok(event) = Event::new(
                Self::NAME,
                EventCategory::Os,
                format!("Found {} banned kernel cmdline arguments", found_banned.len()),
                json!({ "found_banned": found_banned }),
                priority,
            ) {
                result.add_event(event);
            }
        }

        missing_required.is_empty() && found_banned.is_empty()
    }
}

impl DataAnalyzer for CmdlineAnalyzer {
    type DataModel = CmdlineDataModel;
    type AnalyzeArgs = CmdlineAnalyzerArgs;

    const NAME: &'static str = "CmdlineAnalyzer";

    fn analyze_data(
        &mut self,
        data: &Self::DataModel,
        max_event_priority_level: EventPriority,
        args: Option<Self::AnalyzeArgs>,
        result: &mut TaskResult,
    ) -> anyhow::Result<()> {
        let Some(args) = args else {
            result.status = ExecutionStatus::NotRan;
            result.message = Some("Cmdline analysis args not provided".to_string());
            return Ok(());
        };

        if self.compare_cmdline(&data.cmdline, &args.required_cmdline, &args.banned_cmdline, max_event_priority_level, result) {
            result.status = ExecutionStatus::Ok;
            result.message = Some("Kernel cmdline matches expected".to_string());
            return Ok(());
        }

        result.status = ExecutionStatus::Error;
        result.message = Some("Illegal kernel cmdline".to_string());
        let priority = EventPriority::Critical.min(max_event_priority_level);
        if let Ok(event) = Event::new(Self::NAME, EventCategory::Os, "Illegal kernel cmdline", json!({}), priority) {
            result.add_event(event);
        }
        Ok(())
    }
}

pub fn register(registry: &mut PluginRegistry) {
    registry
        .register_plugin(PluginDescriptor {
            name: "CmdlinePlugin",
            connection_type: Some("InBandConnectionManager"),
            ctor: || {
                Box::new(
                    CmdlinePlugin::new("CmdlinePlugin", Some("InBandConnectionManager"))
                        .with_collector(CmdlineCollector)
                        .with_analyzer(CmdlineAnalyzer),
                )
            },
            data_model_name: "CmdlineDataModel",
            supported_os_family: &[OsFamily::Linux],
        })
        .expect("CmdlinePlugin always declares both a collector and an analyzer");
}
