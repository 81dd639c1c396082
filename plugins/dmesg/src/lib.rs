//! `DmesgPlugin`: reads the kernel ring buffer and scans it for known and
//! unknown error signatures.
//!
//! Grounded in `original_source/errorscraper/plugins/inband/dmesg/` (the
//! collector shape, `dmesg --time-format iso -x`, sudo) and
//! `original_source/errorscraper/base/regexanalyzer.py` (the grouped/ungrouped
//! regex-match contract implemented generically as
//! `nodescraper_api::check_all_regexes`). `custom_error_patterns` and
//! `check_unknown_dmesg_errors`/`exclude_category` follow
//! `test/functional/test_dmesg_custom_patterns.py`'s fixtures.

use std::collections::HashSet;

use nodescraper_api::{
    check_all_regexes, Connection, DataAnalyzer, DataCollector, DataModel, EventCategory,
    EventPriority, ExecutionStatus, ImportableDataModel, OsFamily, RegexRule,
    SystemInteractionLevel, TaskResult,
};
use nodescraper_core::registry::{PluginDescriptor, PluginRegistry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type DmesgPlugin = nodescraper_core::DataPlugin<DmesgCollector, DmesgAnalyzer>;

const DMESG_CMD: &str = "dmesg --time-format iso -x";

/// The differ's `content`-field convention (see `nodescraper-core::compare`)
/// is how this model opts into the extracted-errors shortcut instead of a
/// recursive structural diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmesgDataModel {
    pub content: String,
}

impl DataModel for DmesgDataModel {
    fn model_name(&self) -> &'static str {
        "DmesgData"
    }
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn get_compare_content(&self) -> Option<String> {
        Some(self.content.clone())
    }
}

impl ImportableDataModel for DmesgDataModel {
    fn model_name_hint() -> &'static str {
        "DmesgData"
    }
}

#[derive(Default)]
pub struct DmesgCollector;

impl DataCollector for DmesgCollector {
    type DataModel = DmesgDataModel;
    type CollectArgs = ();

    const NAME: &'static str = "DmesgCollector";

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
            DMESG_CMD,
            true,
            None,
            false,
            result,
        )?;

        if artifact.exit_code != 0 {
            let priority = EventPriority::Error.min(max_event_priority_level);
            if let Ok(event) = nodescraper_api::Event::new(
                Self::NAME,
                EventCategory::Os,
                "Error reading dmesg",
                json!({ "command": artifact.command, "exit_code": artifact.exit_code }),
                priority,
            ) {
                result.add_event(event);
            }
        }

        if artifact.stdout.is_empty() {
            result.message = Some("dmesg produced no output".to_string());
            result.status = ExecutionStatus::Error;
            return Ok(None);
        }

        result.message = Some("Dmesg data collected".to_string());
        Ok(Some(DmesgDataModel { content: artifact.stdout }))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomErrorPattern {
    pub pattern: String,
    pub message: String,
    #[serde(default = "default_category")]
    pub category: EventCategory,
    #[serde(default = "default_priority")]
    pub priority: EventPriority,
}

fn default_category() -> EventCategory {
    EventCategory::Unknown
}
fn default_priority() -> EventPriority {
    EventPriority::Error
}

#[derive(Debug, Deserialize)]
pub struct DmesgAnalyzerArgs {
    #[serde(default)]
    pub custom_error_patterns: Vec<CustomErrorPattern>,
    #[serde(default = "default_true")]
    pub check_unknown_dmesg_errors: bool,
    #[serde(default)]
    pub exclude_category: HashSet<String>,
    #[serde(default = "default_true")]
    pub group: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DmesgAnalyzerArgs {
    fn default() -> Self {
        DmesgAnalyzerArgs {
            custom_error_patterns: Vec::new(),
            check_unknown_dmesg_errors: true,
            exclude_category: HashSet::new(),
            group: true,
        }
    }
}

/// Known dmesg error signatures, checked before the generic "unknown error
/// keyword" fallback so recognizable failures get a specific, actionable
/// message instead of a bare keyword match.
fn known_error_rules() -> Vec<RegexRule> {
    vec![
        RegexRule {
            pattern: Regex::new(r"oom_kill_process").expect("static pattern"),
            message: "Out of memory error".to_string(),
            event_category: EventCategory::Memory,
            event_priority: EventPriority::Error,
        },
        RegexRule {
            pattern: Regex::new(r"amdgpu: .*qcm fence wait loop timeout expired").expect("static pattern"),
            message: "QCM fence timeout".to_string(),
            event_category: EventCategory::Compute,
            event_priority: EventPriority::Error,
        },
        RegexRule {
            pattern: Regex::new(r"amdgpu: Fatal error during GPU init").expect("static pattern"),
            message: "Fatal error during GPU init".to_string(),
            event_category: EventCategory::Compute,
            event_priority: EventPriority::Critical,
        },
        RegexRule {
            pattern: Regex::new(r"amdgpu: Failed to disallow cf state").expect("static pattern"),
            message: "Failed to disallow cf state".to_string(),
            event_category: EventCategory::Compute,
            event_priority: EventPriority::Error,
        },
    ]
}

/// The default keyword fallback from `spec.md` §4.9, reused here as the
/// "unknown dmesg error" catch-all rather than only in the compare-runs
/// differ.
fn unknown_error_rule() -> RegexRule {
    RegexRule {
        // no end anchor: `.` already stops at the line's `\n`, so this
        // naturally scopes each match to a single dmesg line.
        pattern: Regex::new(r"(?i)\b(error|fail|critical|crit|alert|emerg)\b.*")
            .expect("static pattern"),
        message: "Unknown dmesg error".to_string(),
        event_category: EventCategory::Unknown,
        event_priority: EventPriority::Error,
    }
}

#[derive(Default)]
pub struct DmesgAnalyzer;

impl DataAnalyzer for DmesgAnalyzer {
    type DataModel = DmesgDataModel;
    type AnalyzeArgs = DmesgAnalyzerArgs;

    const NAME: &'static str = "DmesgAnalyzer";
    const TASK_TYPE: &'static str = "DATA_ANALYZER";

    fn analyze_data(
        &mut self,
        data: &Self::DataModel,
        max_event_priority_level: EventPriority,
        args: Option<Self::AnalyzeArgs>,
        result: &mut TaskResult,
    ) -> anyhow::Result<()> {
        let args = args.unwrap_or_default();

        let mut rules = known_error_rules();
        for custom in &args.custom_error_patterns {
            let Ok(pattern) = Regex::new(&custom.pattern) else {
                let priority = EventPriority::Error.min(max_event_priority_level);
                if let Ok(event) = nodescraper_api::Event::new(
                    Self::NAME,
                    EventCategory::Runtime,
                    format!("Invalid custom error pattern: {}", custom.pattern),
                    json!({ "pattern": custom.pattern }),
                    priority,
                ) {
                    result.add_event(event);
                }
                continue;
            };
            rules.push(RegexRule {
                pattern,
                message: custom.message.clone(),
                event_category: custom.category,
                event_priority: custom.priority,
            });
        }
        if args.check_unknown_dmesg_errors {
            rules.push(unknown_error_rule());
        }

        let events = check_all_regexes(
            &data.content,
            "dmesg",
            &rules,
            args.group,
            max_event_priority_level,
            Self::NAME,
            Self::TASK_TYPE,
        );

        let mut worst = ExecutionStatus::Ok;
        let mut kept = 0usize;
        for event in events {
            if args.exclude_category.contains(&format!("{:?}", event.category).to_uppercase()) {
                continue;
            }
            worst = worst.max(match event.priority {
                EventPriority::Critical | EventPriority::Error => ExecutionStatus::Error,
                EventPriority::Warning => ExecutionStatus::Warning,
                EventPriority::Info => ExecutionStatus::Ok,
            });
            kept += 1;
            result.add_event(event);
        }

        result.status = worst;
        result.message = Some(if kept == 0 {
            "No dmesg errors detected".to_string()
        } else {
            format!("{kept} dmesg error signature(s) detected")
        });
        Ok(())
    }
}

pub fn register(registry: &mut PluginRegistry) {
    registry
        .register_plugin(PluginDescriptor {
            name: "DmesgPlugin",
            connection_type: Some("InBandConnectionManager"),
            ctor: || {
                Box::new(
                    DmesgPlugin::new("DmesgPlugin", Some("InBandConnectionManager"))
                        .with_collector(DmesgCollector)
                        .with_analyzer(DmesgAnalyzer),
                )
            },
            data_model_name: "DmesgData",
            supported_os_family: &[OsFamily::Linux],
        })
        .expect("DmesgPlugin always declares both a collector and an analyzer");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_content() -> String {
        [
            "kern  :err   : 2024-10-07T10:17:15,145363-04:00 oom_kill_process",
            "kern  :err   : 2024-10-07T10:17:15,145363-04:00 amdgpu: qcm fence wait loop timeout expired",
            "kern  :err   : 2024-10-07T10:17:15,145363-04:00 unknown error one",
            "kern  :err   : 2024-10-07T10:17:15,145363-04:00 unknown error two",
        ]
        .join("\n")
    }

    #[test]
    fn known_signatures_are_recognized_with_specific_messages() {
        let data = DmesgDataModel { content: sample_content() };
        let mut analyzer = DmesgAnalyzer;
        let mut result = TaskResult::new(Some("DmesgAnalyzer".into()), Some("DmesgPlugin".into()));
        analyzer.analyze_data(&data, EventPriority::Critical, None, &mut result).unwrap();

        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.events.iter().any(|e| e.description == "Out of memory error"));
        assert!(result.events.iter().any(|e| e.description == "QCM fence timeout"));
    }

    #[test]
    fn unknown_errors_are_grouped_by_default() {
        let data = DmesgDataModel {
            content: "kern: unknown error\nkern: unknown error\n".to_string(),
        };
        let mut analyzer = DmesgAnalyzer;
        let mut result = TaskResult::new(None, None);
        analyzer
            .analyze_data(
                &data,
                EventPriority::Critical,
                Some(DmesgAnalyzerArgs {
                    check_unknown_dmesg_errors: true,
                    ..Default::default()
                }),
                &mut result,
            )
            .unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].data.get("count").and_then(|v| v.as_i64()), Some(2));
    }

    #[test]
    fn disabling_unknown_error_check_suppresses_the_fallback() {
        let data = DmesgDataModel {
            content: "kern: unknown error\n".to_string(),
        };
        let mut analyzer = DmesgAnalyzer;
        let mut result = TaskResult::new(None, None);
        analyzer
            .analyze_data(
                &data,
                EventPriority::Critical,
                Some(DmesgAnalyzerArgs {
                    check_unknown_dmesg_errors: false,
                    ..Default::default()
                }),
                &mut result,
            )
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert!(result.events.is_empty());
    }

    #[test]
    fn custom_error_pattern_is_applied() {
        let data = DmesgDataModel {
            content: "test_custom_driver xyz failed".to_string(),
        };
        let mut analyzer = DmesgAnalyzer;
        let mut result = TaskResult::new(None, None);
        analyzer
            .analyze_data(
                &data,
                EventPriority::Critical,
                Some(DmesgAnalyzerArgs {
                    check_unknown_dmesg_errors: false,
                    custom_error_patterns: vec![CustomErrorPattern {
                        pattern: "test_custom_driver.*failed".to_string(),
                        message: "Test custom driver failure".to_string(),
                        category: EventCategory::SwDriver,
                        priority: EventPriority::Error,
                    }],
                    ..Default::default()
                }),
                &mut result,
            )
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].description, "Test custom driver failure");
    }

    #[test]
    fn exclude_category_filters_matching_events() {
        let data = DmesgDataModel { content: "oom_kill_process".to_string() };
        let mut analyzer = DmesgAnalyzer;
        let mut result = TaskResult::new(None, None);
        analyzer
            .analyze_data(
                &data,
                EventPriority::Critical,
                Some(DmesgAnalyzerArgs {
                    exclude_category: HashSet::from(["MEMORY".to_string()]),
                    check_unknown_dmesg_errors: false,
                    ..Default::default()
                }),
                &mut result,
            )
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert!(result.events.is_empty());
    }

    #[test]
    fn collector_reports_error_on_empty_output() {
        struct EmptyConnection;
        impl Connection for EmptyConnection {
            fn run_command(
                &mut self,
                _command: &str,
                _timeout: Option<std::time::Duration>,
                _sudo: bool,
            ) -> anyhow::Result<nodescraper_api::CommandArtifact> {
                Ok(nodescraper_api::CommandArtifact {
                    command: DMESG_CMD.to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: 0,
                })
            }
            fn read_file(&mut self, _path: &str) -> anyhow::Result<nodescraper_api::FileArtifact> {
                unimplemented!()
            }
        }
        let mut connection = EmptyConnection;
        let mut collector = DmesgCollector;
        let mut result = TaskResult::new(Some("DmesgCollector".into()), Some("DmesgPlugin".into()));
        let data = collector
            .collect_data(&mut connection, SystemInteractionLevel::Standard, EventPriority::Critical, None, &mut result)
            .unwrap();
        assert!(data.is_none());
        assert_eq!(result.status, ExecutionStatus::Error);
    }

    #[test]
    fn dmesg_data_model_round_trips_through_log_model() {
        let dir = tempfile::tempdir().unwrap();
        let original = DmesgDataModel { content: sample_content() };
        original.log_model(dir.path()).unwrap();

        let imported = DmesgDataModel::import_model(dir.path()).unwrap();
        assert_eq!(imported, original);
    }
}
