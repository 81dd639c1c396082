//! The on-disk plugin configuration and its merge semantics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One layer of configuration. A run is driven by the result of folding a
/// list of these (see [`merge_configs`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    /// Copied into the `run(...)` call of every plugin that declares a
    /// matching argument name.
    #[serde(default)]
    pub global_args: IndexMap<String, Value>,
    /// Insertion order is significant and preserved end-to-end: it is the
    /// plugin execution order.
    #[serde(default)]
    pub plugins: IndexMap<String, Value>,
    #[serde(default)]
    pub result_collators: IndexMap<String, Value>,
}

/// Folds a list of config layers into one effective config.
///
/// `global_args` and `result_collators` are folded key-wise, last-wins.
/// `plugins` is also folded key-wise, but last-wins replaces the *entire*
/// per-plugin argument value rather than deep-merging it — a later layer
/// that only supplies `analysis_args` for a plugin drops any
/// `collection_args` an earlier layer set for that same plugin. This
/// matches the reference implementation's `merge_configs`.
///
/// A plugin already present keeps its first-occurrence position even when a
/// later layer overwrites its value.
pub fn merge_configs(layers: &[PluginConfig]) -> PluginConfig {
    let mut merged = PluginConfig::default();
    for layer in layers {
        if layer.name.is_some() {
            merged.name = layer.name.clone();
        }
        if layer.desc.is_some() {
            merged.desc = layer.desc.clone();
        }
        for (key, value) in &layer.global_args {
            merged.global_args.insert(key.clone(), value.clone());
        }
        for (key, value) in &layer.plugins {
            merged.plugins.insert(key.clone(), value.clone());
        }
        for (key, value) in &layer.result_collators {
            merged.result_collators.insert(key.clone(), value.clone());
        }
    }
    merged
}
