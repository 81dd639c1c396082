//! Resolution of `--plugin-configs`, `--system-config`, `--connection-config`
//! and the `--set` escape hatch into the types `nodescraper-core` consumes.
//!
//! Grounded in `original_source/errorscraper`'s CLI: a list of config names
//! or paths is folded left-to-right through [`nodescraper_api::merge_configs`];
//! the reflective per-plugin flag generation that list replaces (per
//! `SPEC_FULL.md` §6 REDESIGN) is not reproduced here.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use nodescraper_api::{merge_configs, PluginConfig};
use nodescraper_core::{InBandTarget, SshConnectionParams};
use serde::Deserialize;
use serde_json::Value;

/// Built-in reference configurations, embedded at compile time. This is the
/// "registry contract" `spec.md` §1 scopes actual config content out of;
/// adding another one is a one-line addition here.
pub const BUILT_IN_CONFIGS: &[(&str, &str)] = &[
    ("default", include_str!("../configs/default.json")),
    ("kernel-only", include_str!("../configs/kernel_only.json")),
];

fn builtin_config_source(name: &str) -> Option<&'static str> {
    BUILT_IN_CONFIGS
        .iter()
        .find(|(builtin_name, _)| *builtin_name == name)
        .map(|(_, contents)| *contents)
}

/// User-level override/extension directory for named configs:
/// `<config_dir>/nodescraper/configs/<name>.json`, checked between the
/// embedded built-ins and a raw filesystem path so a site can add or shadow
/// a built-in config by name without touching the binary.
fn user_config_path(name: &str) -> Option<std::path::PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "nodescraper", "nodescraper")?;
    Some(dirs.config_dir().join("configs").join(format!("{name}.json")))
}

/// Resolves one `--plugin-configs` entry: a built-in name takes priority,
/// then a same-named file under the user config directory, then falls back
/// to treating the argument as a filesystem path.
pub fn load_config_layer(name_or_path: &str) -> Result<PluginConfig> {
    let contents = if let Some(embedded) = builtin_config_source(name_or_path) {
        embedded.to_string()
    } else if let Some(path) = user_config_path(name_or_path).filter(|p| p.is_file()) {
        fs::read_to_string(&path).with_context(|| format!("failed to read user config {}", path.display()))?
    } else {
        fs::read_to_string(name_or_path)
            .with_context(|| format!("plugin config {name_or_path:?} is neither a built-in config name nor a readable path"))?
    };
    serde_json::from_str(&contents).with_context(|| format!("failed to parse plugin config {name_or_path:?}"))
}

pub fn load_merged_config(layer_names: &[String]) -> Result<PluginConfig> {
    let mut layers = Vec::with_capacity(layer_names.len());
    for name in layer_names {
        layers.push(load_config_layer(name)?);
    }
    Ok(merge_configs(&layers))
}

/// Parses one `--set <Plugin>.<key>=<value>` argument. `<value>` is parsed as
/// JSON when possible (so `--set KernelPlugin.analysis_args={"exp_kernel":["5.4"]}`
/// works) and falls back to a JSON string otherwise (so `--set Foo.bar=baz`
/// does not require quoting).
pub fn parse_set_arg(raw: &str) -> Result<(String, String, Value)> {
    let (lhs, value_str) = raw
        .split_once('=')
        .with_context(|| format!("--set argument {raw:?} is missing '=': expected <Plugin>.<key>=<value>"))?;
    let (plugin, key) = lhs
        .split_once('.')
        .with_context(|| format!("--set argument {raw:?} is missing '.': expected <Plugin>.<key>=<value>"))?;
    let value = serde_json::from_str(value_str).unwrap_or_else(|_| Value::String(value_str.to_string()));
    Ok((plugin.to_string(), key.to_string(), value))
}

/// Folds parsed `--set` assignments into a merged config's per-plugin args,
/// last-wins per `(plugin, key)` pair, creating the plugin's entry (and
/// queueing it, at the tail) if it was not already in the merged config.
pub fn apply_set_args(config: &mut PluginConfig, sets: &[(String, String, Value)]) {
    for (plugin, key, value) in sets {
        let entry = config
            .plugins
            .entry(plugin.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(serde_json::Map::new());
        }
        entry
            .as_object_mut()
            .expect("just normalized to an object above")
            .insert(key.clone(), value.clone());
    }
}

/// Restricts a merged config's plugin queue to the given names, in the
/// order supplied, dropping everything else. An empty filter is a no-op
/// (run the full resolved queue).
pub fn filter_plugins(config: &mut PluginConfig, only: &[String]) {
    if only.is_empty() {
        return;
    }
    let mut filtered = IndexMap::new();
    for name in only {
        if let Some(args) = config.plugins.get(name) {
            filtered.insert(name.clone(), args.clone());
        } else {
            filtered.insert(name.clone(), Value::Object(serde_json::Map::new()));
        }
    }
    config.plugins = filtered;
}

#[derive(Debug, Default, Deserialize)]
pub struct SystemConfigFile {
    pub sku: Option<String>,
    pub platform: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

pub fn load_system_config(path: &Path) -> Result<SystemConfigFile> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read system config {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse system config {}", path.display()))
}

/// One `--connection-config` entry: either a local transport (the default
/// when a manager class has no entry at all) or a remote one carrying full
/// SSH parameters.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ConnectionTargetConfig {
    Local,
    Remote(SshConnectionParams),
}

/// Parses `--connection-config`: a JSON object keyed by connection-manager
/// class name (currently only `"InBandConnectionManager"` is meaningful),
/// each value a [`ConnectionTargetConfig`].
pub fn load_connection_config(path: &Path) -> Result<IndexMap<String, InBandTarget>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read connection config {}", path.display()))?;
    let raw: IndexMap<String, ConnectionTargetConfig> =
        serde_json::from_str(&contents).with_context(|| format!("failed to parse connection config {}", path.display()))?;
    Ok(raw
        .into_iter()
        .map(|(name, target)| {
            let target = match target {
                ConnectionTargetConfig::Local => InBandTarget::Local,
                ConnectionTargetConfig::Remote(params) => InBandTarget::Remote(params),
            };
            (name, target)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_default_config_parses() {
        let config = load_config_layer("default").unwrap();
        assert!(config.plugins.contains_key("KernelPlugin"));
        assert!(config.plugins.contains_key("DmesgPlugin"));
    }

    #[test]
    fn set_arg_parses_json_and_falls_back_to_string() {
        let (plugin, key, value) = parse_set_arg("KernelPlugin.exp_kernel=[\"5.4\"]").unwrap();
        assert_eq!(plugin, "KernelPlugin");
        assert_eq!(key, "exp_kernel");
        assert_eq!(value, serde_json::json!(["5.4"]));

        let (_, _, value) = parse_set_arg("KernelPlugin.note=hello").unwrap();
        assert_eq!(value, serde_json::json!("hello"));
    }

    #[test]
    fn apply_set_args_creates_and_overwrites_plugin_entries() {
        let mut config = PluginConfig::default();
        apply_set_args(&mut config, &[("KernelPlugin".into(), "x".into(), serde_json::json!(1))]);
        assert_eq!(config.plugins.get("KernelPlugin"), Some(&serde_json::json!({"x": 1})));
        apply_set_args(&mut config, &[("KernelPlugin".into(), "x".into(), serde_json::json!(2))]);
        assert_eq!(config.plugins.get("KernelPlugin"), Some(&serde_json::json!({"x": 2})));
    }

    #[test]
    fn filter_plugins_restricts_and_reorders() {
        let mut config = PluginConfig::default();
        config.plugins.insert("A".into(), serde_json::json!({}));
        config.plugins.insert("B".into(), serde_json::json!({}));
        config.plugins.insert("C".into(), serde_json::json!({}));
        filter_plugins(&mut config, &["C".to_string(), "A".to_string()]);
        let order: Vec<&str> = config.plugins.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["C", "A"]);
    }
}
