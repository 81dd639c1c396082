//! Canonical [`TaskResultHook`] implementation: persists every `TaskResult`
//! to a directory tree under a base path.

use std::fs;
use std::path::{Path, PathBuf};

use nodescraper_api::{Artifact, DataModel, FileContents, TaskResult, TaskResultHook};
use serde::Serialize;

use crate::utils::{pascal_to_snake, unique_filename};

pub struct FileSystemLogHook {
    base_path: PathBuf,
}

impl FileSystemLogHook {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        FileSystemLogHook {
            base_path: base_path.into(),
        }
    }

    fn task_dir(&self, result: &TaskResult) -> PathBuf {
        let parent = pascal_to_snake(result.parent.as_deref().unwrap_or("_root"));
        let task = pascal_to_snake(result.task.as_deref().unwrap_or("_task"));
        self.base_path.join(parent).join(task)
    }
}

#[derive(Serialize)]
struct FileArtifactMeta<'a> {
    filename: &'a str,
    sidecar_path: String,
}

impl TaskResultHook for FileSystemLogHook {
    fn process_result(&self, result: &mut TaskResult, data: Option<&dyn DataModel>) -> anyhow::Result<()> {
        let dir = self.task_dir(result);
        fs::create_dir_all(&dir)?;

        let result_path = dir.join("result.json");
        fs::write(&result_path, serde_json::to_vec_pretty(&result.without_payload())?)?;
        result.artifact_file_paths.push(path_string(&result_path));

        let mut commands = Vec::new();
        let mut file_metas = Vec::new();
        for artifact in &result.artifacts {
            match artifact {
                Artifact::Command(command) => commands.push(command),
                Artifact::File(file) => {
                    let name = unique_filename(&dir, &file.filename);
                    let sidecar_path = dir.join(&name);
                    match &file.contents {
                        FileContents::Text(text) => fs::write(&sidecar_path, text)?,
                        FileContents::Binary(bytes) => fs::write(&sidecar_path, bytes)?,
                    }
                    result.artifact_file_paths.push(path_string(&sidecar_path));
                    file_metas.push(FileArtifactMeta {
                        filename: &file.filename,
                        sidecar_path: path_string(&sidecar_path),
                    });
                }
            }
        }

        if !commands.is_empty() {
            let path = dir.join("command_artifacts.json");
            fs::write(&path, serde_json::to_vec_pretty(&commands)?)?;
            result.artifact_file_paths.push(path_string(&path));
        }
        if !file_metas.is_empty() {
            let path = dir.join("file_artifacts.json");
            fs::write(&path, serde_json::to_vec_pretty(&file_metas)?)?;
            result.artifact_file_paths.push(path_string(&path));
        }

        if !result.events.is_empty() {
            let path = dir.join("events.json");
            fs::write(&path, serde_json::to_vec_pretty(&result.events)?)?;
            result.artifact_file_paths.push(path_string(&path));
        }

        if let Some(model) = data {
            let path = model.log_model(&dir)?;
            result.artifact_file_paths.push(path_string(&path));
        }

        Ok(())
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescraper_api::{CommandArtifact, Event, EventCategory, EventPriority, ExecutionStatus};
    use serde_json::json;

    #[derive(Debug)]
    struct FakeModel;
    impl DataModel for FakeModel {
        fn model_name(&self) -> &'static str {
            "FakeModel"
        }
        fn to_json(&self) -> serde_json::Value {
            json!({ "value": 1 })
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn writes_result_json_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let hook = FileSystemLogHook::new(dir.path());
        let mut result = TaskResult::new(Some("KernelCollector".into()), Some("KernelPlugin".into()));
        result.status = ExecutionStatus::Ok;
        result.add_event(Event::new("t", EventCategory::Os, "d", json!({}), EventPriority::Info).unwrap());
        result.add_artifact(Artifact::Command(CommandArtifact {
            command: "uname -r".into(),
            stdout: "5.4.0".into(),
            stderr: String::new(),
            exit_code: 0,
        }));
        result.finalize();

        hook.process_result(&mut result, Some(&FakeModel)).unwrap();

        let task_dir = dir.path().join("kernel_plugin").join("kernel_collector");
        assert!(task_dir.join("result.json").exists());
        assert!(task_dir.join("events.json").exists());
        assert!(task_dir.join("command_artifacts.json").exists());
        assert!(task_dir.join("FakeModel.json").exists());
        assert!(!result.artifact_file_paths.is_empty());
    }

    #[test]
    fn dedupes_file_artifact_sidecar_names() {
        let dir = tempfile::tempdir().unwrap();
        let hook = FileSystemLogHook::new(dir.path());
        let mut first = TaskResult::new(Some("DmesgCollector".into()), Some("DmesgPlugin".into()));
        first.add_artifact(Artifact::File(nodescraper_api::FileArtifact {
            filename: "dmesg.log".into(),
            contents: FileContents::Text("a".into()),
        }));
        first.finalize();
        hook.process_result(&mut first, None).unwrap();

        let mut second = TaskResult::new(Some("DmesgCollector".into()), Some("DmesgPlugin".into()));
        second.add_artifact(Artifact::File(nodescraper_api::FileArtifact {
            filename: "dmesg.log".into(),
            contents: FileContents::Text("b".into()),
        }));
        second.finalize();
        hook.process_result(&mut second, None).unwrap();

        let task_dir = dir.path().join("dmesg_plugin").join("dmesg_collector");
        assert!(task_dir.join("dmesg.log").exists());
        assert!(task_dir.join("dmesg (1).log").exists());
    }
}
