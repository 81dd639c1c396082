//! Compare-runs differ: load two persisted run directories (as written by
//! [`crate::hooks::FileSystemLogHook`]) and report, per plugin, either a
//! recursive structural diff or an extracted-errors shortcut.
//!
//! The source reconstructs typed pydantic models per plugin (via the plugin
//! registry's `DATA_MODEL` and an optional `import_model`/`get_error_matches`
//! override) before diffing. Once data is only JSON on disk there is nothing
//! in Rust to reflect on, so this differ works directly on the persisted
//! `to_json()` trees instead of rehydrating typed models: a model counts as
//! log-like for the extracted-errors shortcut when its JSON object carries a
//! top-level string field named `content` (the convention
//! [`crate::data_model`]-implementing models use for
//! `DataModel::get_compare_content`'s persisted form), and errors are always
//! extracted with the default keyword pattern rather than a per-analyzer
//! override — the registry indirection needed to recover that override has
//! no counterpart once the differ only sees bytes on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use nodescraper_api::{ExecutionStatus, PluginResult};
use serde_json::Value;

use crate::collators::TableSummaryCollator;

const RESERVED_FILES: &[&str] = &["result.json", "events.json", "command_artifacts.json", "file_artifacts.json"];
const FULL_DIFF_VALUE_CAP: usize = 8192;

pub struct CompareRunsReport {
    pub output_path: PathBuf,
    pub plugin_results: Vec<PluginResult>,
}

fn error_pattern() -> regex::Regex {
    regex::RegexBuilder::new(r"^.*\b(error|fail|critical|crit|warning|warn|alert|emerg)\b.*$")
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .expect("static pattern is valid")
}

fn extract_error_lines(content: &str) -> BTreeSet<String> {
    error_pattern()
        .find_iter(content)
        .map(|m| m.as_str().trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Loads every plugin's persisted data model from one run directory, keyed
/// by plugin name (the `parent` field of that plugin's `result.json`).
fn load_run_directory(run_dir: &Path) -> anyhow::Result<indexmap::IndexMap<String, Value>> {
    let mut out = indexmap::IndexMap::new();
    let parents = match fs::read_dir(run_dir) {
        Ok(entries) => entries,
        Err(err) => anyhow::bail!("failed to read run directory {}: {err}", run_dir.display()),
    };

    for parent_entry in parents.filter_map(Result::ok) {
        if !parent_entry.path().is_dir() {
            continue;
        }
        let task_dirs = match fs::read_dir(parent_entry.path()) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for task_entry in task_dirs.filter_map(Result::ok) {
            let task_dir = task_entry.path();
            if !task_dir.is_dir() || !task_dir.join("result.json").exists() {
                continue;
            }
            if let Some((plugin_name, model)) = load_task_dir(&task_dir) {
                out.insert(plugin_name, model);
            }
        }
    }
    Ok(out)
}

fn load_task_dir(task_dir: &Path) -> Option<(String, Value)> {
    let result_bytes = fs::read(task_dir.join("result.json")).ok()?;
    let result_json: Value = serde_json::from_slice(&result_bytes).ok()?;
    let plugin_name = result_json.get("parent")?.as_str()?.to_string();

    let model_path = fs::read_dir(task_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .find(|p| {
            p.extension().and_then(|e| e.to_str()) == Some("json")
                && !RESERVED_FILES.contains(&p.file_name().and_then(|n| n.to_str()).unwrap_or(""))
        })?;

    let mut model: Value = serde_json::from_slice(&fs::read(&model_path).ok()?).ok()?;
    if let Some(content) = model.get("content").and_then(Value::as_str) {
        let errors: Vec<String> = extract_error_lines(content).into_iter().collect();
        if let Some(obj) = model.as_object_mut() {
            obj.insert("extracted_errors".to_string(), serde_json::json!(errors));
        }
    }
    Some((plugin_name, model))
}

/// Recursively diffs two JSON trees, returning `(dotted/indexed path, run1
/// value, run2 value)` for every leaf disagreement.
fn diff_value(a: &Value, b: &Value, path: &str) -> Vec<(String, Option<Value>, Option<Value>)> {
    let mut diffs = Vec::new();

    match (a, b) {
        (Value::Object(map_a), Value::Object(map_b)) => {
            let mut keys: BTreeSet<&String> = map_a.keys().collect();
            keys.extend(map_b.keys());
            for key in keys {
                let sub_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                match (map_a.get(key), map_b.get(key)) {
                    (Some(v1), Some(v2)) => diffs.extend(diff_value(v1, v2, &sub_path)),
                    (Some(v1), None) => diffs.push((sub_path, Some(v1.clone()), None)),
                    (None, Some(v2)) => diffs.push((sub_path, None, Some(v2.clone()))),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            for i in 0..arr_a.len().max(arr_b.len()) {
                let sub_path = format!("{path}[{i}]");
                match (arr_a.get(i), arr_b.get(i)) {
                    (Some(v1), Some(v2)) => diffs.extend(diff_value(v1, v2, &sub_path)),
                    (Some(v1), None) => diffs.push((sub_path, Some(v1.clone()), None)),
                    (None, Some(v2)) => diffs.push((sub_path, None, Some(v2.clone()))),
                    (None, None) => {}
                }
            }
        }
        _ if a != b => diffs.push((path.to_string(), Some(a.clone()), Some(b.clone()))),
        _ => {}
    }
    diffs
}

fn format_value(value: &Option<Value>, max_len: Option<usize>) -> String {
    let Some(value) = value else {
        return "<missing>".to_string();
    };
    let mut s = match value {
        Value::String(s) => format!("{s:?}"),
        other => other.to_string(),
    };
    if let Some(max) = max_len {
        if s.len() > max {
            s.truncate(max.saturating_sub(3));
            s.push_str("...");
        }
    }
    s
}

fn format_value_for_report(value: &Option<Value>) -> String {
    let mut s = format_value(value, None);
    if s.len() > FULL_DIFF_VALUE_CAP {
        let total = s.len();
        s.truncate(FULL_DIFF_VALUE_CAP);
        s.push_str(&format!(" ... [truncated, total {total} characters]"));
    }
    s
}

fn errors_only(d1: &Value, d2: &Value) -> (Vec<String>, Vec<String>) {
    let set = |v: &Value| -> BTreeSet<String> {
        v.get("extracted_errors")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|e| e.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };
    let (e1, e2) = (set(d1), set(d2));
    (
        e1.difference(&e2).cloned().collect(),
        e2.difference(&e1).cloned().collect(),
    )
}

fn has_extracted_errors(value: &Value) -> bool {
    value.get("extracted_errors").is_some()
}

fn build_full_report(path1: &Path, path2: &Path, data1: &indexmap::IndexMap<String, Value>, data2: &indexmap::IndexMap<String, Value>, plugins: &[String]) -> String {
    let mut lines = vec![
        "Compare-runs full diff report".to_string(),
        format!("Run 1: {}", path1.display()),
        format!("Run 2: {}", path2.display()),
        String::new(),
    ];
    for plugin_name in plugins {
        lines.push("=".repeat(80));
        lines.push(format!("Plugin: {plugin_name}"));
        lines.push("=".repeat(80));
        let (Some(d1), Some(d2)) = (data1.get(plugin_name), data2.get(plugin_name)) else {
            lines.push(format!(
                "  Not present in {}.",
                if data1.get(plugin_name).is_none() { "run 1" } else { "run 2" }
            ));
            lines.push(String::new());
            continue;
        };
        let is_log_like = has_extracted_errors(d1) || has_extracted_errors(d2);
        if is_log_like {
            let (only_1, only_2) = errors_only(d1, d2);
            lines.push("  --- Errors only in run 1 ---".to_string());
            lines.extend(only_1.iter().map(|e| format!("  {e}")));
            lines.push(String::new());
            lines.push("  --- Errors only in run 2 ---".to_string());
            lines.extend(only_2.iter().map(|e| format!("  {e}")));
            lines.push(String::new());
        }
        let diffs = diff_value(d1, d2, "");
        if diffs.is_empty() {
            if !is_log_like {
                lines.push("  No differences.".to_string());
            }
            lines.push(String::new());
            continue;
        }
        if is_log_like {
            lines.push("  (Other field differences below; see above for extracted_errors comparison.)".to_string());
            lines.push(String::new());
        }
        lines.push(format!("  {} difference(s):", diffs.len()));
        for (p, v1, v2) in &diffs {
            lines.push(format!("  --- path: {p} ---"));
            lines.push(format!("  run1:\n{}", format_value_for_report(v1)));
            lines.push(format!("  run2:\n{}", format_value_for_report(v2)));
            lines.push(String::new());
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn run_compare_runs(
    path1: &Path,
    path2: &Path,
    skip_plugins: &[String],
    include_plugins: Option<&[String]>,
    output_path: Option<&Path>,
) -> anyhow::Result<CompareRunsReport> {
    for p in [path1, path2] {
        if !p.exists() {
            anyhow::bail!("path not found: {}", p.display());
        }
        if !p.is_dir() {
            anyhow::bail!("path is not a directory: {}", p.display());
        }
    }

    tracing::info!(path = %path1.display(), "loading run 1");
    let data1 = load_run_directory(path1)?;
    tracing::info!(path = %path2.display(), "loading run 2");
    let data2 = load_run_directory(path2)?;

    let mut all_plugins: Vec<String> = data1.keys().chain(data2.keys()).cloned().collect();
    all_plugins.sort();
    all_plugins.dedup();

    if let Some(include) = include_plugins {
        let include: BTreeSet<&str> = include.iter().map(String::as_str).collect();
        all_plugins.retain(|p| include.contains(p.as_str()));
    }
    if !skip_plugins.is_empty() {
        let skip: BTreeSet<&str> = skip_plugins.iter().map(String::as_str).collect();
        all_plugins.retain(|p| !skip.contains(p.as_str()));
    }

    let mut plugin_results = Vec::new();
    for plugin_name in &all_plugins {
        let (d1, d2) = (data1.get(plugin_name), data2.get(plugin_name));
        let result = match (d1, d2) {
            (None, _) => PluginResult::not_ran(plugin_name, &format!("Plugin not found in run 1 (path: {}).", path1.display())),
            (_, None) => PluginResult::not_ran(plugin_name, &format!("Plugin not found in run 2 (path: {}).", path2.display())),
            (Some(d1), Some(d2)) => {
                if has_extracted_errors(d1) || has_extracted_errors(d2) {
                    let (only_1, only_2) = errors_only(d1, d2);
                    let mut message = vec![format!("Errors only in run 1: {}; only in run 2: {}.", only_1.len(), only_2.len())];
                    if !only_1.is_empty() {
                        message.push("  Run 1 only (first 3):".to_string());
                        message.extend(only_1.iter().take(3).map(|e| format!("    {e}")));
                    }
                    if !only_2.is_empty() {
                        message.push("  Run 2 only (first 3):".to_string());
                        message.extend(only_2.iter().take(3).map(|e| format!("    {e}")));
                    }
                    let status = if only_1.is_empty() && only_2.is_empty() { ExecutionStatus::Ok } else { ExecutionStatus::Warning };
                    PluginResult {
                        status,
                        source: plugin_name.clone(),
                        message: Some(message.join("\n")),
                        result_data: None,
                    }
                } else {
                    let diffs = diff_value(d1, d2, "");
                    if diffs.is_empty() {
                        PluginResult {
                            status: ExecutionStatus::Ok,
                            source: plugin_name.clone(),
                            message: Some("No differences.".to_string()),
                            result_data: None,
                        }
                    } else {
                        let mut message = vec![format!("{} difference(s):", diffs.len())];
                        message.extend(diffs.iter().map(|(p, v1, v2)| {
                            format!("  {p}: run1={}  run2={}", format_value(v1, Some(80)), format_value(v2, Some(80)))
                        }));
                        PluginResult {
                            status: ExecutionStatus::Warning,
                            source: plugin_name.clone(),
                            message: Some(message.join("\n")),
                            result_data: None,
                        }
                    }
                }
            }
        };
        plugin_results.push(result);
    }

    let output_path = output_path.map(Path::to_path_buf).unwrap_or_else(|| {
        let name1 = path1.file_name().and_then(|n| n.to_str()).unwrap_or("run1");
        let name2 = path2.file_name().and_then(|n| n.to_str()).unwrap_or("run2");
        PathBuf::from(format!("{name1}_{name2}_diff.txt"))
    });
    let report = build_full_report(path1, path2, &data1, &data2, &all_plugins);
    fs::write(&output_path, report)?;
    tracing::info!(path = %output_path.display(), "full diff report written");

    let mut collator = TableSummaryCollator::new();
    {
        use nodescraper_api::PluginResultCollator;
        collator.collate_results(&plugin_results, &[], Value::Null)?;
    }

    Ok(CompareRunsReport { output_path, plugin_results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_run(dir: &Path, plugin: &str, task: &str, model_name: &str, model: &Value) {
        let task_dir = dir.join(plugin).join(task);
        fs::create_dir_all(&task_dir).unwrap();
        fs::write(task_dir.join("result.json"), serde_json::json!({ "parent": plugin, "task": task }).to_string()).unwrap();
        fs::write(task_dir.join(format!("{model_name}.json")), model.to_string()).unwrap();
    }

    #[test]
    fn no_differences_reports_ok() {
        let run1 = tempfile::tempdir().unwrap();
        let run2 = tempfile::tempdir().unwrap();
        let model = serde_json::json!({ "version": "5.4.0" });
        write_run(run1.path(), "kernel_plugin", "kernel_collector", "KernelData", &model);
        write_run(run2.path(), "kernel_plugin", "kernel_collector", "KernelData", &model);

        let report = run_compare_runs(run1.path(), run2.path(), &[], None, Some(&run1.path().join("diff.txt"))).unwrap();
        assert_eq!(report.plugin_results.len(), 1);
        assert_eq!(report.plugin_results[0].status, ExecutionStatus::Ok);
    }

    #[test]
    fn structural_diff_reports_warning_with_path() {
        let run1 = tempfile::tempdir().unwrap();
        let run2 = tempfile::tempdir().unwrap();
        write_run(run1.path(), "kernel_plugin", "kernel_collector", "KernelData", &serde_json::json!({ "version": "5.4.0" }));
        write_run(run2.path(), "kernel_plugin", "kernel_collector", "KernelData", &serde_json::json!({ "version": "5.15.0" }));

        let report = run_compare_runs(run1.path(), run2.path(), &[], None, Some(&run1.path().join("diff.txt"))).unwrap();
        assert_eq!(report.plugin_results[0].status, ExecutionStatus::Warning);
        assert!(report.plugin_results[0].message.as_ref().unwrap().contains("version"));
    }

    #[test]
    fn extracted_errors_shortcut_reports_errors_only_in_run2() {
        let run1 = tempfile::tempdir().unwrap();
        let run2 = tempfile::tempdir().unwrap();
        write_run(run1.path(), "dmesg_plugin", "dmesg_collector", "DmesgData", &serde_json::json!({ "content": "kern: error: X" }));
        write_run(run2.path(), "dmesg_plugin", "dmesg_collector", "DmesgData", &serde_json::json!({ "content": "kern: error: X\nkern: error: Y" }));

        let report = run_compare_runs(run1.path(), run2.path(), &[], None, Some(&run1.path().join("diff.txt"))).unwrap();
        assert_eq!(report.plugin_results[0].status, ExecutionStatus::Warning);
        assert!(report.plugin_results[0].message.as_ref().unwrap().contains("only in run 2: 1"));
    }

    #[test]
    fn plugin_missing_from_one_run_is_not_ran() {
        let run1 = tempfile::tempdir().unwrap();
        let run2 = tempfile::tempdir().unwrap();
        write_run(run1.path(), "kernel_plugin", "kernel_collector", "KernelData", &serde_json::json!({ "version": "5.4.0" }));

        let report = run_compare_runs(run1.path(), run2.path(), &[], None, Some(&run1.path().join("diff.txt"))).unwrap();
        assert_eq!(report.plugin_results[0].status, ExecutionStatus::NotRan);
    }

    #[test]
    fn include_plugins_filters_the_comparison_set() {
        let run1 = tempfile::tempdir().unwrap();
        let run2 = tempfile::tempdir().unwrap();
        write_run(run1.path(), "kernel_plugin", "kernel_collector", "KernelData", &serde_json::json!({ "a": 1 }));
        write_run(run1.path(), "cmdline_plugin", "cmdline_collector", "CmdlineData", &serde_json::json!({ "b": 1 }));
        write_run(run2.path(), "kernel_plugin", "kernel_collector", "KernelData", &serde_json::json!({ "a": 1 }));
        write_run(run2.path(), "cmdline_plugin", "cmdline_collector", "CmdlineData", &serde_json::json!({ "b": 2 }));

        let report = run_compare_runs(
            run1.path(),
            run2.path(),
            &[],
            Some(&["kernel_plugin".to_string()]),
            Some(&run1.path().join("diff.txt")),
        )
        .unwrap();
        assert_eq!(report.plugin_results.len(), 1);
        assert_eq!(report.plugin_results[0].source, "kernel_plugin");
    }
}
