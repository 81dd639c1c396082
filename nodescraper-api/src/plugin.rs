//! The dyn-compatible surface the registry and executor dispatch through.
//!
//! Concrete plugins are written against [`crate::collector::DataCollector`]
//! and [`crate::analyzer::DataAnalyzer`], both of which carry real Rust
//! generics. [`Plugin`] is the thin, object-safe trait a generic
//! `DataPlugin<C, A>` (defined in `nodescraper-core`, which owns connection
//! construction) implements so the executor can hold a
//! `Vec<Box<dyn Plugin>>` without monomorphizing the whole queue.

use std::path::Path;

use serde_json::Value;

use crate::connection::ConnectionManager;
use crate::enums::{EventPriority, SystemInteractionLevel};
use crate::hooks::TaskResultHook;
use crate::plugin_result::PluginResult;
use crate::system_info::SystemInfo;

/// Everything a plugin's `run` needs, assembled fresh by the executor for
/// every dispatch. Carrying this as one struct rather than positional
/// arguments is the idiomatic replacement for the source's `**kwargs`
/// injection: `run_args` is the JSON-merged `global_args`/per-plugin-args
/// value the plugin deserializes into its own declared argument types.
pub struct PluginRunContext<'a> {
    pub collection: bool,
    pub analysis: bool,
    pub max_event_priority_level: EventPriority,
    pub system_interaction_level: SystemInteractionLevel,
    pub preserve_connection: bool,
    pub system_info: &'a mut SystemInfo,
    pub connection_manager: Option<&'a mut dyn ConnectionManager>,
    pub log_path: Option<&'a Path>,
    pub hooks: &'a [Box<dyn TaskResultHook>],
    /// Appends a follow-up `(plugin_name, args)` pair to the executor's
    /// queue. Plugins must not retain this closure past their `run` call.
    pub queue_callback: &'a mut dyn FnMut(String, Value),
    pub run_args: Value,
}

pub trait Plugin: Send {
    /// Registry key and `TaskResult.parent` value.
    fn name(&self) -> &'static str;

    /// Connection-manager registry key this plugin needs, if any. Plugins
    /// with no `COLLECTOR` (analysis-only) declare `None`.
    fn connection_type(&self) -> Option<&'static str> {
        None
    }

    /// At least one of collector/analyzer must be present and the data
    /// model declared; a plugin that fails this is rejected at registry
    /// time, not at dispatch time.
    fn is_valid(&self) -> bool {
        true
    }

    fn run(&mut self, ctx: PluginRunContext<'_>) -> PluginResult;
}
