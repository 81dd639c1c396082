//! The central scheduler: drains a merged plugin queue against a lazily
//! populated connection library, then runs the configured result collators.
//!
//! Grounded in `original_source/errorscraper/pluginexecutor.py`'s
//! `run_queue`: a deque of `(name, args)` pairs, popped from the left,
//! capable of being extended at the tail by the plugin currently running
//! (`queue_callback`). The `finally` block there (disconnect every
//! connection, then run collators) is a `loop { ... } ; cleanup()` here
//! rather than a try/finally, since Rust has no exception to unwind through
//! — the cleanup always runs once the loop exits, whether by queue
//! exhaustion or by a `Ctrl+C` interrupt.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use nodescraper_api::{
    ConnectionManager, EventPriority, ExecutionStatus, PluginConfig, PluginResult,
    SystemInfo, SystemInteractionLevel, TaskResult, TaskResultHook,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::connection::{InBandConnectionManager, InBandTarget};
use crate::hooks::FileSystemLogHook;
use crate::registry::PluginRegistry;

fn merge_run_args(global_args: &IndexMap<String, Value>, plugin_args: &Value) -> Value {
    let mut merged = serde_json::Map::new();
    for (key, value) in global_args {
        merged.insert(key.clone(), value.clone());
    }
    if let Some(obj) = plugin_args.as_object() {
        for (key, value) in obj {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Result of one `run_queue()` drain: every plugin's composite result, plus
/// whether the run was cut short by an interrupt.
pub struct RunOutcome {
    pub plugin_results: Vec<PluginResult>,
    pub interrupted: bool,
}

impl RunOutcome {
    /// Process exit code convention from `spec.md` §7/§5: 130 on interrupt,
    /// 1 if any plugin result's status exceeds `WARNING`, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            return 130;
        }
        if self.plugin_results.iter().any(|r| r.status.exceeds_warning()) {
            1
        } else {
            0
        }
    }
}

pub struct PluginExecutor {
    registry: Arc<PluginRegistry>,
    plugin_config: PluginConfig,
    system_info: SystemInfo,
    system_interaction_level: SystemInteractionLevel,
    max_event_priority_level: EventPriority,
    log_path: Option<PathBuf>,
    hooks: Arc<Vec<Box<dyn TaskResultHook>>>,
    connection_library: IndexMap<String, InBandConnectionManager>,
    connection_targets: IndexMap<String, InBandTarget>,
}

impl PluginExecutor {
    pub fn new(
        registry: Arc<PluginRegistry>,
        plugin_config: PluginConfig,
        system_info: SystemInfo,
        system_interaction_level: SystemInteractionLevel,
        max_event_priority_level: EventPriority,
        log_path: Option<PathBuf>,
        connection_targets: IndexMap<String, InBandTarget>,
    ) -> Self {
        let mut hooks: Vec<Box<dyn TaskResultHook>> = Vec::new();
        if let Some(path) = &log_path {
            hooks.push(Box::new(FileSystemLogHook::new(path.clone())));
        }
        PluginExecutor {
            registry,
            plugin_config,
            system_info,
            system_interaction_level,
            max_event_priority_level,
            log_path,
            hooks: Arc::new(hooks),
            connection_library: IndexMap::new(),
            connection_targets,
        }
    }

    /// Drains the merged plugin queue. See module docs for the drain/cleanup
    /// shape; ordering guarantees (insertion order, append-to-tail queue
    /// extension, collect-before-analyze within a plugin) are upheld by
    /// `DataPlugin::run` and the `VecDeque` used here.
    ///
    /// Destructures `self` into its fields up front so the borrow checker
    /// sees disjoint borrows of `connection_library`, `system_info`, etc.
    /// across one loop iteration, instead of one long-lived `&mut self`.
    pub fn run_queue(&mut self) -> RunOutcome {
        let PluginExecutor {
            registry,
            plugin_config,
            system_info,
            system_interaction_level,
            max_event_priority_level,
            log_path,
            hooks,
            connection_library,
            connection_targets,
        } = self;

        let mut queue: VecDeque<(String, Value)> =
            plugin_config.plugins.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let flag = interrupted.clone();
            if let Err(err) = ctrlc::set_handler(move || {
                flag.store(true, Ordering::SeqCst);
            }) {
                warn!(error = %err, "failed to install Ctrl+C handler; interrupts will not be honored");
            }
        }

        let mut plugin_results = Vec::new();

        while let Some((name, args)) = queue.pop_front() {
            if interrupted.load(Ordering::SeqCst) {
                break;
            }

            let mut plugin = match registry.build_plugin(&name) {
                Ok(plugin) => plugin,
                Err(err) => {
                    warn!(plugin = %name, error = %err, "skipping unknown plugin");
                    continue;
                }
            };

            let connection_type = plugin.connection_type();
            let manager: Option<&mut dyn ConnectionManager> = match connection_type {
                Some(class_name) => {
                    if !connection_library.contains_key(class_name) {
                        let target = connection_targets
                            .get(class_name)
                            .cloned()
                            .unwrap_or(InBandTarget::Local);
                        match registry.build_connection_manager(class_name, target, hooks.clone()) {
                            Ok(built) => {
                                connection_library.insert(class_name.to_string(), built);
                            }
                            Err(err) => {
                                warn!(plugin = %name, connection = class_name, error = %err, "skipping plugin with unavailable connection");
                                continue;
                            }
                        }
                    }
                    match connection_library.get_mut(class_name) {
                        Some(manager) => Some(manager as &mut dyn ConnectionManager),
                        None => {
                            warn!(plugin = %name, connection = class_name, "skipping plugin with unavailable connection");
                            continue;
                        }
                    }
                }
                None => None,
            };

            let run_args = merge_run_args(&plugin_config.global_args, &args);
            let mut pending: Vec<(String, Value)> = Vec::new();
            let mut queue_callback = |enqueued_name: String, enqueued_args: Value| {
                pending.push((enqueued_name, enqueued_args));
            };

            let log_path_ref = log_path.as_deref();
            let hooks_ref = hooks.clone();

            let run_result = panic::catch_unwind(AssertUnwindSafe(|| {
                plugin.run(nodescraper_api::PluginRunContext {
                    collection: true,
                    analysis: true,
                    max_event_priority_level: *max_event_priority_level,
                    system_interaction_level: *system_interaction_level,
                    preserve_connection: true,
                    system_info: &mut *system_info,
                    connection_manager: manager,
                    log_path: log_path_ref,
                    hooks: hooks_ref.as_slice(),
                    queue_callback: &mut queue_callback,
                    run_args,
                })
            }));

            let result = match run_result {
                Ok(result) => result,
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "plugin panicked".to_string());
                    warn!(plugin = %name, panic = %message, "plugin dispatch panicked; queue continues");
                    PluginResult {
                        status: ExecutionStatus::ExecutionFailure,
                        source: name.clone(),
                        message: Some(format!("plugin panicked: {message}")),
                        result_data: None,
                    }
                }
            };

            info!(plugin = %name, status = ?result.status, "plugin finished");
            plugin_results.push(result);
            queue.extend(pending);
        }

        let was_interrupted = interrupted.load(Ordering::SeqCst);

        for manager in connection_library.values_mut() {
            manager.disconnect();
        }

        let connection_results: Vec<TaskResult> = connection_library
            .values()
            .filter_map(|m| m.result().cloned())
            .collect();

        for (name, args) in &plugin_config.result_collators {
            let mut collator = match registry.build_collator(name) {
                Ok(collator) => collator,
                Err(err) => {
                    warn!(collator = %name, error = %err, "skipping unknown result collator");
                    continue;
                }
            };
            if let Err(err) = collator.collate_results(&plugin_results, &connection_results, args.clone()) {
                warn!(collator = %name, error = %err, "result collator failed");
            }
        }

        RunOutcome {
            plugin_results,
            interrupted: was_interrupted,
        }
    }
}
