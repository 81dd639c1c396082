//! Post-run aggregators over the full list of plugin results.

use serde_json::Value;

use crate::plugin_result::PluginResult;
use crate::task_result::TaskResult;

pub trait PluginResultCollator: Send {
    fn collate_results(
        &mut self,
        plugin_results: &[PluginResult],
        connection_results: &[TaskResult],
        args: Value,
    ) -> anyhow::Result<()>;
}
