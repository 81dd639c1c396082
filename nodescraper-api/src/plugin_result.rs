//! The composite outcome a [`crate::plugin::Plugin`]'s `run` produces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::ExecutionStatus;
use crate::task_result::TaskResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResult {
    pub status: ExecutionStatus,
    /// Class name of the plugin that produced this result.
    pub source: String,
    pub message: Option<String>,
    pub result_data: Option<DataPluginResult>,
}

/// Data-plugin-specific composite: the collector's and analyzer's own
/// `TaskResult`s plus the collected model, dumped as JSON for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPluginResult {
    pub system_data: Option<Value>,
    pub collection_result: TaskResult,
    pub analysis_result: TaskResult,
}

impl PluginResult {
    pub fn not_ran(source: impl Into<String>, message: impl Into<String>) -> Self {
        PluginResult {
            status: ExecutionStatus::NotRan,
            source: source.into(),
            message: Some(message.into()),
            result_data: None,
        }
    }
}
