//! The unit of reportable outcome for any task: a collector, analyzer, or
//! connection manager run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::enums::{EventPriority, ExecutionStatus};
use crate::event::Event;

/// Created at task entry, finalized exactly once at task exit.
///
/// `finalize()` is the only place `status` is derived from events when the
/// caller has not already set it explicitly, and the only place `end_time`
/// is stamped — calling it twice is a logic error in the caller, not in this
/// type, so it is idempotent rather than panicking: a second call is a no-op
/// beyond re-deriving the message if it's still empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: ExecutionStatus,
    pub message: Option<String>,
    /// Class name of the executing collector / analyzer / connection manager.
    pub task: Option<String>,
    /// Class name of the plugin that owns this task, if any.
    pub parent: Option<String>,
    pub artifacts: Vec<Artifact>,
    pub events: Vec<Event>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Paths written by a [`crate::hooks::TaskResultHook`] for this result,
    /// populated after every hook has run. Consumed by the compare-runs
    /// differ to locate sidecar data-model files.
    #[serde(default)]
    pub artifact_file_paths: Vec<String>,
}

impl TaskResult {
    pub fn new(task: Option<String>, parent: Option<String>) -> Self {
        TaskResult {
            status: ExecutionStatus::Unset,
            message: None,
            task,
            parent,
            artifacts: Vec::new(),
            events: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            artifact_file_paths: Vec::new(),
        }
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    fn derive_status_from_events(&self) -> ExecutionStatus {
        if self.events.iter().any(|e| e.priority >= EventPriority::Error) {
            ExecutionStatus::Error
        } else if self.events.iter().any(|e| e.priority == EventPriority::Warning) {
            ExecutionStatus::Warning
        } else {
            ExecutionStatus::Ok
        }
    }

    fn event_summary(&self) -> String {
        let mut info = 0;
        let mut warning = 0;
        let mut error = 0;
        let mut critical = 0;
        for event in &self.events {
            match event.priority {
                EventPriority::Info => info += 1,
                EventPriority::Warning => warning += 1,
                EventPriority::Error => error += 1,
                EventPriority::Critical => critical += 1,
            }
        }
        format!(
            "{} event(s): {} info, {} warning, {} error, {} critical",
            self.events.len(),
            info,
            warning,
            error,
            critical
        )
    }

    /// Called exactly once at task exit. Stamps `end_time`, derives `status`
    /// from events if it is still `UNSET`, fills a default message, and
    /// appends an event-count summary.
    pub fn finalize(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
        if self.status == ExecutionStatus::Unset {
            self.status = self.derive_status_from_events();
        }
        if self.message.is_none() {
            self.message = Some(format!("{:?}", self.status));
        }
        let summary = self.event_summary();
        self.message = Some(match self.message.take() {
            Some(existing) if !existing.is_empty() => format!("{existing} ({summary})"),
            _ => summary,
        });
    }

    /// A copy of this result with artifacts and events stripped, matching
    /// the `result.json` persistence contract.
    pub fn without_payload(&self) -> TaskResult {
        TaskResult {
            status: self.status,
            message: self.message.clone(),
            task: self.task.clone(),
            parent: self.parent.clone(),
            artifacts: Vec::new(),
            events: Vec::new(),
            start_time: self.start_time,
            end_time: self.end_time,
            artifact_file_paths: self.artifact_file_paths.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::EventCategory;
    use serde_json::json;

    fn event(priority: EventPriority) -> Event {
        Event::new("t", EventCategory::Os, "d", json!({}), priority).unwrap()
    }

    #[test]
    fn finalize_sets_end_time_and_status() {
        let mut result = TaskResult::new(Some("KernelCollector".into()), None);
        result.finalize();
        assert_ne!(result.status, ExecutionStatus::Unset);
        assert!(result.end_time.unwrap() >= result.start_time);
    }

    #[test]
    fn finalize_derives_error_when_any_event_is_error_or_above() {
        let mut result = TaskResult::new(None, None);
        result.add_event(event(EventPriority::Warning));
        result.add_event(event(EventPriority::Critical));
        result.finalize();
        assert_eq!(result.status, ExecutionStatus::Error);
    }

    #[test]
    fn finalize_derives_warning_when_only_warnings() {
        let mut result = TaskResult::new(None, None);
        result.add_event(event(EventPriority::Warning));
        result.finalize();
        assert_eq!(result.status, ExecutionStatus::Warning);
    }

    #[test]
    fn finalize_derives_ok_with_no_events() {
        let mut result = TaskResult::new(None, None);
        result.finalize();
        assert_eq!(result.status, ExecutionStatus::Ok);
    }

    #[test]
    fn explicit_status_is_not_overridden_by_finalize() {
        let mut result = TaskResult::new(None, None);
        result.status = ExecutionStatus::NotRan;
        result.add_event(event(EventPriority::Critical));
        result.finalize();
        assert_eq!(result.status, ExecutionStatus::NotRan);
    }
}
