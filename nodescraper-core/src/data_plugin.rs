//! Generic composition of a collector and analyzer into one runnable unit.
//!
//! `DataPlugin<C, A>` is kept as real Rust generics (`spec.md` §9: "preserve
//! them" for languages that have generics) rather than erased behind
//! `Box<dyn Any>`; it implements the object-safe [`Plugin`] trait so the
//! registry/executor can still store heterogeneous plugins in one queue.

use std::path::Path;

use nodescraper_api::{
    ConnectionManager, DataAnalyzer, DataCollector, DataPluginResult, Event, EventCategory,
    EventPriority, ExecutionStatus, ImportableDataModel, Plugin, PluginResult, PluginRunContext,
    SystemCompatibilityError, SystemInteractionLevel, TaskResult, TaskResultHook,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::{run_collect_task, run_void_task};

#[derive(Debug, Deserialize, Default)]
struct RunArgsEnvelope {
    #[serde(default)]
    collection_args: Value,
    #[serde(default)]
    analysis_args: Value,
}

pub struct DataPlugin<C, A>
where
    C: DataCollector,
    A: DataAnalyzer<DataModel = C::DataModel>,
{
    name: &'static str,
    connection_type: Option<&'static str>,
    collector: Option<C>,
    analyzer: Option<A>,
    data: Option<C::DataModel>,
    collection_result: TaskResult,
    analysis_result: TaskResult,
}

impl<C, A> DataPlugin<C, A>
where
    C: DataCollector,
    A: DataAnalyzer<DataModel = C::DataModel>,
{
    pub fn new(name: &'static str, connection_type: Option<&'static str>) -> Self {
        DataPlugin {
            name,
            connection_type,
            collector: None,
            analyzer: None,
            data: None,
            collection_result: not_ran(name, "not yet run"),
            analysis_result: not_ran(name, "not yet run"),
        }
    }

    pub fn with_collector(mut self, collector: C) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_analyzer(mut self, analyzer: A) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Overrides `data` directly, for analysis-only invocations.
    pub fn set_data(&mut self, data: C::DataModel) {
        self.data = Some(data);
    }

    fn collect(
        &mut self,
        connection_manager: Option<&mut dyn ConnectionManager>,
        system_info: &mut nodescraper_api::SystemInfo,
        interaction_level: SystemInteractionLevel,
        max_event_priority_level: EventPriority,
        args_value: Value,
        hooks: &[Box<dyn TaskResultHook>],
        preserve_connection: bool,
    ) -> TaskResult {
        let Some(collector) = self.collector.as_mut() else {
            return not_ran(C::NAME, "no collector declared for this plugin");
        };

        let Some(manager) = connection_manager else {
            return not_ran(C::NAME, "connection not available");
        };

        // Connect-once: a manager whose result is already set (success or
        // failure) is never retried within this run.
        if manager.result().is_none() {
            manager.connect(system_info);
        }
        let connected_ok = manager
            .result()
            .map(|r| r.status == ExecutionStatus::Ok)
            .unwrap_or(false);
        if !connected_ok {
            return not_ran(C::NAME, "Connection not available");
        }

        if let Err(err) = collector.check_compatibility(system_info) {
            return not_ran(C::NAME, &err.to_string());
        }

        let args = serde_json::from_value(args_value).unwrap_or_default();
        let connection = manager
            .connection_mut()
            .expect("connected_ok implies a live connection");

        let (result, data) = run_collect_task(C::NAME, Some(C::NAME.to_string()), Some(self.name.to_string()), hooks, |task_result| {
            collector.collect_data(connection, interaction_level, max_event_priority_level, Some(args), task_result)
        });

        if !preserve_connection {
            manager.disconnect();
        }

        self.data = data;
        result
    }

    fn analyze(
        &mut self,
        max_event_priority_level: EventPriority,
        args_value: Value,
        hooks: &[Box<dyn TaskResultHook>],
    ) -> TaskResult {
        let Some(analyzer) = self.analyzer.as_mut() else {
            return not_ran(A::NAME, "no analyzer declared for this plugin");
        };
        let Some(data) = self.data.as_ref() else {
            return not_ran(A::NAME, "No data available");
        };
        let args = serde_json::from_value(args_value).unwrap_or_default();
        run_void_task(A::NAME, Some(A::NAME.to_string()), Some(self.name.to_string()), hooks, |task_result| {
            analyzer.analyze_data(data, max_event_priority_level, Some(args), task_result)
        })
    }
}

/// Analysis-only loading paths, split into their own `impl` block because
/// they need `C::DataModel: ImportableDataModel` — a bound `collect`/`analyze`
/// above don't require.
impl<C, A> DataPlugin<C, A>
where
    C: DataCollector,
    C::DataModel: ImportableDataModel,
    A: DataAnalyzer<DataModel = C::DataModel>,
{
    /// Loads `data` from an already-parsed JSON value (a dict, in the
    /// source's terms), for analysis-only invocations driven by a config
    /// rather than a fresh collection.
    pub fn set_data_from_value(&mut self, value: Value) -> anyhow::Result<()> {
        self.data = Some(C::DataModel::import_from_value(value)?);
        Ok(())
    }

    /// Loads `data` from the directory a prior run's [`nodescraper_api::DataModel::log_model`]
    /// wrote to, for analysis-only invocations against a persisted run.
    pub fn set_data_from_path(&mut self, dir: &Path) -> anyhow::Result<()> {
        self.data = Some(C::DataModel::import_model(dir)?);
        Ok(())
    }
}

fn not_ran(task: &str, message: &str) -> TaskResult {
    let mut result = TaskResult::new(Some(task.to_string()), None);
    result.status = ExecutionStatus::NotRan;
    result.message = Some(message.to_string());
    result.finalize();
    result
}

impl<C, A> Plugin for DataPlugin<C, A>
where
    C: DataCollector,
    A: DataAnalyzer<DataModel = C::DataModel>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn connection_type(&self) -> Option<&'static str> {
        self.connection_type
    }

    fn is_valid(&self) -> bool {
        self.collector.is_some() || self.analyzer.is_some()
    }

    fn run(&mut self, ctx: PluginRunContext<'_>) -> PluginResult {
        let envelope: RunArgsEnvelope = serde_json::from_value(ctx.run_args.clone()).unwrap_or_default();

        if ctx.collection {
            self.collection_result = self.collect(
                ctx.connection_manager,
                ctx.system_info,
                ctx.system_interaction_level,
                ctx.max_event_priority_level,
                envelope.collection_args,
                ctx.hooks,
                ctx.preserve_connection,
            );
        }
        if ctx.analysis {
            self.analysis_result = self.analyze(ctx.max_event_priority_level, envelope.analysis_args, ctx.hooks);
        }

        let status = self.collection_result.status.max(self.analysis_result.status);
        let message = self
            .analysis_result
            .message
            .clone()
            .or_else(|| self.collection_result.message.clone());

        PluginResult {
            status,
            source: self.name.to_string(),
            message,
            result_data: Some(DataPluginResult {
                system_data: self.data.as_ref().map(|d| d.to_json()),
                collection_result: self.collection_result.clone(),
                analysis_result: self.analysis_result.clone(),
            }),
        }
    }
}

/// Event emitted by the connect-once short-circuit path isn't otherwise
/// observable outside tests; kept here for reuse by plugin crates that want
/// the same "skip compatibility" messaging for custom collectors.
pub fn compatibility_event(reporter: &str, err: &SystemCompatibilityError) -> anyhow::Result<Event> {
    Ok(Event::new(reporter, EventCategory::Os, err.to_string(), json!({}), EventPriority::Warning)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_valid_requires_collector_or_analyzer() {
        struct NoopCollector;
        #[derive(Debug)]
        struct NoopModel;
        impl nodescraper_api::DataModel for NoopModel {
            fn model_name(&self) -> &'static str {
                "Noop"
            }
            fn to_json(&self) -> Value {
                json!({})
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
        impl DataCollector for NoopCollector {
            type DataModel = NoopModel;
            type CollectArgs = ();
            const NAME: &'static str = "NoopCollector";
            fn collect_data(
                &mut self,
                _connection: &mut dyn nodescraper_api::Connection,
                _interaction_level: SystemInteractionLevel,
                _max_event_priority_level: EventPriority,
                _args: Option<Self::CollectArgs>,
                _result: &mut TaskResult,
            ) -> anyhow::Result<Option<Self::DataModel>> {
                Ok(Some(NoopModel))
            }
        }
        struct NoopAnalyzer;
        impl DataAnalyzer for NoopAnalyzer {
            type DataModel = NoopModel;
            type AnalyzeArgs = ();
            const NAME: &'static str = "NoopAnalyzer";
            fn analyze_data(
                &mut self,
                _data: &Self::DataModel,
                _max_event_priority_level: EventPriority,
                _args: Option<Self::AnalyzeArgs>,
                _result: &mut TaskResult,
            ) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let plugin: DataPlugin<NoopCollector, NoopAnalyzer> = DataPlugin::new("NoopPlugin", None);
        assert!(!plugin.is_valid());

        let plugin = plugin.with_collector(NoopCollector);
        assert!(plugin.is_valid());
    }

    #[test]
    fn analysis_only_data_loads_from_value_and_from_path() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct TinyModel {
            n: u32,
        }
        impl nodescraper_api::DataModel for TinyModel {
            fn model_name(&self) -> &'static str {
                "TinyModel"
            }
            fn to_json(&self) -> Value {
                serde_json::to_value(self).unwrap()
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
        impl ImportableDataModel for TinyModel {
            fn model_name_hint() -> &'static str {
                "TinyModel"
            }
        }
        struct TinyCollector;
        impl DataCollector for TinyCollector {
            type DataModel = TinyModel;
            type CollectArgs = ();
            const NAME: &'static str = "TinyCollector";
            fn collect_data(
                &mut self,
                _connection: &mut dyn nodescraper_api::Connection,
                _interaction_level: SystemInteractionLevel,
                _max_event_priority_level: EventPriority,
                _args: Option<Self::CollectArgs>,
                _result: &mut TaskResult,
            ) -> anyhow::Result<Option<Self::DataModel>> {
                Ok(Some(TinyModel { n: 0 }))
            }
        }
        struct TinyAnalyzer;
        impl DataAnalyzer for TinyAnalyzer {
            type DataModel = TinyModel;
            type AnalyzeArgs = ();
            const NAME: &'static str = "TinyAnalyzer";
            fn analyze_data(
                &mut self,
                _data: &Self::DataModel,
                _max_event_priority_level: EventPriority,
                _args: Option<Self::AnalyzeArgs>,
                _result: &mut TaskResult,
            ) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let mut plugin: DataPlugin<TinyCollector, TinyAnalyzer> = DataPlugin::new("TinyPlugin", None);
        plugin.set_data_from_value(json!({ "n": 7 })).unwrap();
        assert_eq!(plugin.data, Some(TinyModel { n: 7 }));

        let dir = tempfile::tempdir().unwrap();
        nodescraper_api::DataModel::log_model(&TinyModel { n: 9 }, dir.path()).unwrap();
        plugin.set_data_from_path(dir.path()).unwrap();
        assert_eq!(plugin.data, Some(TinyModel { n: 9 }));
    }
}
