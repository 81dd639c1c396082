//! `nodescraper`: compose configurations, run the plugin queue against a
//! target system, aggregate results into tables, and diff two prior runs.
//!
//! Grounded in `original_source/errorscraper/cli`'s subcommand surface
//! (`run-plugins`, `describe`, `gen-plugin-config`, `compare-runs`); the
//! reflective per-plugin flag generation and dynamic subparser construction
//! that surface relies on there is explicitly out of scope per `spec.md`
//! §1/§9 REDESIGN and is replaced by the `--set` escape hatch (`cli_config.rs`).

mod cli_config;
mod registry;
mod styling;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use nodescraper_api::{EventPriority, OsFamily, SystemInteractionLevel, SystemLocation};
use nodescraper_core::{run_compare_runs, PluginExecutor};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nodescraper", version, about = "Node-health scraping framework")]
struct Cli {
    /// Name to record for the target system. Defaults to the local hostname.
    #[arg(long, global = true)]
    sys_name: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = CliSystemLocation::Local)]
    sys_location: CliSystemLocation,

    #[arg(long, global = true, value_enum, default_value_t = CliInteractionLevel::Standard)]
    sys_interaction_level: CliInteractionLevel,

    #[arg(long, global = true)]
    sys_sku: Option<String>,

    #[arg(long, global = true)]
    sys_platform: Option<String>,

    /// Built-in config names (see `describe config`) and/or JSON file paths,
    /// layered left-to-right (last one wins per key; see `spec.md` §3).
    #[arg(long, global = true, num_args = 0..)]
    plugin_configs: Vec<String>,

    #[arg(long, global = true)]
    system_config: Option<PathBuf>,

    #[arg(long, global = true)]
    connection_config: Option<PathBuf>,

    /// Directory under which `scraper_logs_<timestamp>/` is created. Pass
    /// the literal string "None" to disable filesystem logging entirely.
    #[arg(long, global = true, default_value = ".")]
    log_path: String,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliSystemLocation {
    Local,
    Remote,
}

impl From<CliSystemLocation> for SystemLocation {
    fn from(value: CliSystemLocation) -> Self {
        match value {
            CliSystemLocation::Local => SystemLocation::Local,
            CliSystemLocation::Remote => SystemLocation::Remote,
        }
    }
}

impl std::fmt::Display for CliSystemLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CliSystemLocation::Local => "local",
            CliSystemLocation::Remote => "remote",
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliInteractionLevel {
    Surface,
    Standard,
    Disruptive,
}

impl From<CliInteractionLevel> for SystemInteractionLevel {
    fn from(value: CliInteractionLevel) -> Self {
        match value {
            CliInteractionLevel::Surface => SystemInteractionLevel::Surface,
            CliInteractionLevel::Standard => SystemInteractionLevel::Standard,
            CliInteractionLevel::Disruptive => SystemInteractionLevel::Disruptive,
        }
    }
}

impl std::fmt::Display for CliInteractionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CliInteractionLevel::Surface => "surface",
            CliInteractionLevel::Standard => "standard",
            CliInteractionLevel::Disruptive => "disruptive",
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the resolved plugin queue (optionally restricted to named plugins).
    RunPlugins {
        /// If given, only these plugins (in this order) run; otherwise the
        /// full resolved queue runs in its merged-config order.
        plugin_names: Vec<String>,

        /// Repeatable `<Plugin>.<key>=<value>` override folded into the
        /// merged config before the queue is built.
        #[arg(long = "set", value_name = "PLUGIN.KEY=VALUE")]
        set: Vec<String>,
    },
    /// List or describe a config or plugin.
    Describe {
        #[arg(value_enum)]
        kind: DescribeKind,
        name: Option<String>,
    },
    /// Emit a merged `PluginConfig` JSON without running anything.
    GenPluginConfig {
        #[arg(long, num_args = 0..)]
        plugins: Vec<String>,
        #[arg(long = "built-in-configs", num_args = 0..)]
        built_in_configs: Vec<String>,
        #[arg(long)]
        output_path: PathBuf,
        #[arg(long)]
        config_name: Option<String>,
    },
    /// Diff two persisted run directories.
    CompareRuns {
        run1: PathBuf,
        run2: PathBuf,
        #[arg(long = "skip-plugins", num_args = 0..)]
        skip_plugins: Vec<String>,
        #[arg(long = "include-plugins", num_args = 0..)]
        include_plugins: Vec<String>,
        #[arg(long)]
        output_path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DescribeKind {
    Config,
    Plugin,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let exit_code = match &cli.command {
        Commands::RunPlugins { plugin_names, set } => run_plugins(&cli, plugin_names, set)?,
        Commands::Describe { kind, name } => {
            describe(*kind, name.as_deref())?;
            0
        }
        Commands::GenPluginConfig {
            plugins,
            built_in_configs,
            output_path,
            config_name,
        } => {
            gen_plugin_config(built_in_configs, plugins, output_path, config_name.as_deref())?;
            0
        }
        Commands::CompareRuns {
            run1,
            run2,
            skip_plugins,
            include_plugins,
            output_path,
        } => compare_runs(run1, run2, skip_plugins, include_plugins, output_path.as_deref())?,
    };

    std::process::exit(exit_code);
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn default_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name;
        }
    }
    if let Ok(contents) = fs::read_to_string("/proc/sys/kernel/hostname") {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    "localhost".to_string()
}

/// Resolves `--log-path`: `"None"` (case-insensitive) disables filesystem
/// logging; otherwise creates `<dir>/scraper_logs_<timestamp>/` and returns
/// it, matching `spec.md` §6's persisted-run layout.
fn resolve_log_path(log_path: &str) -> Result<Option<PathBuf>> {
    if log_path.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let timestamp = Local::now().format("%Y_%m_%d-%I_%M_%S_%p").to_string();
    let run_dir = Path::new(log_path).join(format!("scraper_logs_{timestamp}"));
    fs::create_dir_all(&run_dir).with_context(|| format!("failed to create log directory {}", run_dir.display()))?;
    Ok(Some(run_dir))
}

fn build_system_info(cli: &Cli) -> Result<nodescraper_api::SystemInfo> {
    let mut system_info = nodescraper_api::SystemInfo::new(
        cli.sys_name.clone().unwrap_or_else(default_hostname),
        cli.sys_location.into(),
    );
    system_info.sku = cli.sys_sku.clone();
    system_info.platform = cli.sys_platform.clone();

    if let Some(path) = &cli.system_config {
        let file = cli_config::load_system_config(path)?;
        if system_info.sku.is_none() {
            system_info.sku = file.sku;
        }
        if system_info.platform.is_none() {
            system_info.platform = file.platform;
        }
        for (key, value) in file.metadata {
            system_info.metadata.entry(key).or_insert(value);
        }
    }
    Ok(system_info)
}

fn run_plugins(cli: &Cli, plugin_names: &[String], set_args: &[String]) -> Result<i32> {
    let registry = Arc::new(registry::build_registry());

    let layer_names = if cli.plugin_configs.is_empty() {
        vec!["default".to_string()]
    } else {
        cli.plugin_configs.clone()
    };
    let mut merged = cli_config::load_merged_config(&layer_names)?;

    let parsed_sets: Result<Vec<_>> = set_args.iter().map(|raw| cli_config::parse_set_arg(raw)).collect();
    cli_config::apply_set_args(&mut merged, &parsed_sets?);
    cli_config::filter_plugins(&mut merged, plugin_names);

    let connection_targets: IndexMap<String, nodescraper_core::InBandTarget> = match &cli.connection_config {
        Some(path) => cli_config::load_connection_config(path)?,
        None => IndexMap::new(),
    };

    let system_info = build_system_info(cli)?;
    let log_path = resolve_log_path(&cli.log_path)?;

    if let Some(path) = &log_path {
        fs::write(path.join("system_info.json"), serde_json::to_vec_pretty(&system_info)?)?;
    }

    let mut executor = PluginExecutor::new(
        registry,
        merged,
        system_info,
        cli.sys_interaction_level.into(),
        EventPriority::Critical,
        log_path,
        connection_targets,
    );

    let outcome = executor.run_queue();
    let exit_code = outcome.exit_code();
    let icon = if exit_code == 0 { styling::icon_success() } else { styling::icon_error() };
    println!("{icon} {} plugin(s) ran, exit code {exit_code}", outcome.plugin_results.len());
    Ok(exit_code)
}

fn describe(kind: DescribeKind, name: Option<&str>) -> Result<()> {
    match kind {
        DescribeKind::Config => match name {
            None => {
                for (builtin_name, _) in cli_config::BUILT_IN_CONFIGS {
                    println!("{builtin_name}");
                }
            }
            Some(name) => {
                let config = cli_config::load_config_layer(name)?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        },
        DescribeKind::Plugin => {
            let registry = registry::build_registry();
            match name {
                None => {
                    for plugin_name in registry.plugin_names() {
                        println!("{plugin_name}");
                    }
                }
                Some(name) => {
                    let descriptor = registry
                        .plugin_descriptor(name)
                        .with_context(|| format!("unknown plugin: {name}"))?;
                    let summary = json!({
                        "name": descriptor.name,
                        "data_model": descriptor.data_model_name,
                        "connection_type": descriptor.connection_type,
                        "supported_os_family": descriptor.supported_os_family.iter().map(os_family_name).collect::<Vec<_>>(),
                    });
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }
    }
    Ok(())
}

fn os_family_name(family: &OsFamily) -> &'static str {
    match family {
        OsFamily::Linux => "LINUX",
        OsFamily::Windows => "WINDOWS",
        OsFamily::Unknown => "UNKNOWN",
    }
}

fn gen_plugin_config(
    built_in_configs: &[String],
    plugins: &[String],
    output_path: &Path,
    config_name: Option<&str>,
) -> Result<()> {
    let mut merged = cli_config::load_merged_config(built_in_configs)?;
    if !plugins.is_empty() {
        cli_config::filter_plugins(&mut merged, plugins);
    }
    if let Some(name) = config_name {
        merged.name = Some(name.to_string());
    }
    let contents = serde_json::to_string_pretty(&merged)?;
    fs::write(output_path, contents).with_context(|| format!("failed to write {}", output_path.display()))?;
    println!("wrote {}", output_path.display());
    Ok(())
}

fn compare_runs(
    run1: &Path,
    run2: &Path,
    skip_plugins: &[String],
    include_plugins: &[String],
    output_path: Option<&Path>,
) -> Result<i32> {
    let include = if include_plugins.is_empty() { None } else { Some(include_plugins) };
    let report = run_compare_runs(run1, run2, skip_plugins, include, output_path)?;
    println!("diff report written to {}", report.output_path.display());

    let exceeds_warning = report
        .plugin_results
        .iter()
        .any(|r| r.status.exceeds_warning());
    Ok(if exceeds_warning { 1 } else { 0 })
}
