//! Typed, persistable containers of collected data.

use std::any::Any;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;

/// Named container of collected data.
///
/// Rust has no `isinstance`, so the analyzer-side validation the source
/// performs at runtime ("is `data` an instance of my declared `DATA_MODEL`")
/// is instead a compile-time constraint wherever generics reach (a
/// `DataAnalyzer` is generic over its `DataModel` associated type), and an
/// `as_any` downcast only at the few boundaries that must be dynamic (the
/// plugin registry, the task-result hooks, the compare-runs differ).
pub trait DataModel: Any + Send + Sync + std::fmt::Debug {
    /// Stable name used for snake_case directory/file naming and for the
    /// registry's model lookup during `import_model`.
    fn model_name(&self) -> &'static str;

    /// Dump to a plain JSON value for persistence and for the compare-runs
    /// differ's structural diff.
    fn to_json(&self) -> Value;

    fn as_any(&self) -> &dyn Any;

    /// Write this model under `dir`. The default implementation writes
    /// `<model_name>.json`; models with [`FileModel`] children override this
    /// to additionally write sidecar files and exclude those bytes from the
    /// JSON body.
    fn log_model(&self, dir: &Path) -> Result<std::path::PathBuf> {
        let path = dir.join(format!("{}.json", self.model_name()));
        std::fs::write(&path, serde_json::to_vec_pretty(&self.to_json())?)?;
        Ok(path)
    }

    /// Compare-runs differ hook: models whose comparison content should be
    /// treated as log-like text (extracted-errors shortcut) rather than a
    /// structural diff override this to return the text to scan.
    fn get_compare_content(&self) -> Option<String> {
        None
    }
}

/// Bytes plus a filename; logged as a sidecar file by
/// [`DataModel::log_model`] implementations that embed one, and excluded
/// from the parent's JSON body. A `DataModel::log_model` override that embeds
/// one writes `dir.join(&file_model.filename)` with `file_model.contents`
/// directly; no collector in this tree embeds one yet, so there is no
/// present call site for a dedicated write helper.
#[derive(Debug, Clone)]
pub struct FileModel {
    pub filename: String,
    pub contents: Vec<u8>,
}

/// Reconstructs a [`DataModel`] from disk or from an already-parsed JSON
/// value — the Rust counterpart of the source's `DataModel.import_model`.
///
/// Kept as a separate supertrait rather than folded into [`DataModel`]
/// itself: `import_model` returns `Self`, which is not object-safe, so it
/// cannot live on a trait this crate stores as `Box<dyn DataModel>`/
/// `&dyn DataModel` at the registry/hooks/differ boundaries. Every concrete
/// plugin data model derives `serde::Deserialize`, so implementing this
/// trait is a one-line `impl ImportableDataModel for XxxModel { fn
/// model_name_hint() -> &'static str { "XxxModel" } }` with both provided
/// methods inherited for free.
pub trait ImportableDataModel: DataModel + serde::de::DeserializeOwned {
    /// Reads `<dir>/<model_name>.json`, the layout [`DataModel::log_model`]'s
    /// default implementation writes.
    fn import_model(dir: &Path) -> Result<Self>
    where
        Self: Sized,
    {
        let path = dir.join(format!("{}.json", Self::model_name_hint()));
        let bytes = std::fs::read(&path)
            .map_err(|err| anyhow::anyhow!("failed to read {}: {err}", path.display()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Parses a model from an already-loaded JSON value (a dict, in the
    /// source's terms) rather than a file path.
    fn import_from_value(value: Value) -> Result<Self>
    where
        Self: Sized,
    {
        Ok(serde_json::from_value(value)?)
    }

    /// `model_name()` requires an instance; `import_model` needs the name
    /// before one exists. Concrete models override this to their
    /// `model_name()` constant so both stay in sync.
    fn model_name_hint() -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ProbeModel {
        value: u32,
    }

    impl DataModel for ProbeModel {
        fn model_name(&self) -> &'static str {
            "ProbeModel"
        }

        fn to_json(&self) -> Value {
            serde_json::to_value(self).expect("probe model always serializes")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl ImportableDataModel for ProbeModel {
        fn model_name_hint() -> &'static str {
            "ProbeModel"
        }
    }

    #[test]
    fn import_model_round_trips_through_log_model() {
        let dir = tempfile::tempdir().unwrap();
        let original = ProbeModel { value: 42 };
        original.log_model(dir.path()).unwrap();

        let imported = ProbeModel::import_model(dir.path()).unwrap();
        assert_eq!(imported, original);
    }

    #[test]
    fn import_from_value_parses_a_loaded_json_dict() {
        let value = serde_json::json!({"value": 7});
        let imported = ProbeModel::import_from_value(value).unwrap();
        assert_eq!(imported, ProbeModel { value: 7 });
    }
}
