//! The uniform error boundary wrapped around `connect`, `collect_data`, and
//! `analyze_data`.
//!
//! The source wraps these three entry points with a Python decorator that
//! initializes a `TaskResult`, catches any raised exception, finalizes the
//! result, and runs the task-result hooks. Rust has no unchecked-exception
//! equivalent, so "the inner body raised" becomes "the inner closure
//! returned `Err`", and a Rust `panic!` inside a plugin body is additionally
//! caught here with `catch_unwind` so one bad plugin can never abort the
//! whole executor loop.

use std::panic::{self, AssertUnwindSafe};

use nodescraper_api::{DataModel, Event, EventCategory, EventPriority, ExecutionStatus, TaskResult, TaskResultHook};
use serde_json::json;

const MAX_ERROR_MESSAGE: usize = 4096;

fn truncate(message: &str, max: usize) -> String {
    if message.len() <= max {
        message.to_string()
    } else {
        let boundary = message
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= max)
            .last()
            .unwrap_or(0);
        format!("{}... [truncated]", &message[..boundary])
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked with a non-string payload".to_string()
    }
}

fn record_runtime_failure(result: &mut TaskResult, reporter: &str, message: String) {
    let description = format!("unhandled error: {}", truncate(&message, MAX_ERROR_MESSAGE));
    let event = Event::new(reporter, EventCategory::Runtime, description, json!({}), EventPriority::Critical)
        .expect("engine-constructed event always respects the size caps");
    result.add_event(event);
    result.status = ExecutionStatus::ExecutionFailure;
}

fn run_hooks(result: &mut TaskResult, data: Option<&dyn DataModel>, hooks: &[Box<dyn TaskResultHook>]) {
    for hook in hooks {
        if let Err(err) = hook.process_result(result, data) {
            tracing::warn!(error = %err, task = ?result.task, "task result hook failed");
        }
    }
}

/// Wraps a body with no return payload (used by `ConnectionManager::connect`
/// and `DataAnalyzer::analyze_data`, whose output is entirely the events and
/// status written into `result`).
pub fn run_void_task<F>(
    reporter: &'static str,
    task: Option<String>,
    parent: Option<String>,
    hooks: &[Box<dyn TaskResultHook>],
    body: F,
) -> TaskResult
where
    F: FnOnce(&mut TaskResult) -> anyhow::Result<()>,
{
    let mut result = TaskResult::new(task, parent);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut result)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => record_runtime_failure(&mut result, reporter, format!("{err:#}")),
        Err(panic) => record_runtime_failure(&mut result, reporter, panic_message(&*panic)),
    }
    result.finalize();
    run_hooks(&mut result, None, hooks);
    result
}

/// Wraps a collector body. If the body returns `Ok(None)` and the body did
/// not explicitly set a status, the result is forced to `EXECUTION_FAILURE`
/// (a collector that produces no data and no explanation is a defect, not a
/// skip — `NOT_RAN` is reserved for the `SystemCompatibilityError` path,
/// handled by the caller before this wrapper ever runs).
pub fn run_collect_task<T, F>(
    reporter: &'static str,
    task: Option<String>,
    parent: Option<String>,
    hooks: &[Box<dyn TaskResultHook>],
    body: F,
) -> (TaskResult, Option<T>)
where
    T: DataModel,
    F: FnOnce(&mut TaskResult) -> anyhow::Result<Option<T>>,
{
    let mut result = TaskResult::new(task, parent);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut result)));
    let data = match outcome {
        Ok(Ok(data)) => data,
        Ok(Err(err)) => {
            record_runtime_failure(&mut result, reporter, format!("{err:#}"));
            None
        }
        Err(panic) => {
            record_runtime_failure(&mut result, reporter, panic_message(&*panic));
            None
        }
    };
    if data.is_none() && result.status == ExecutionStatus::Unset {
        result.status = ExecutionStatus::ExecutionFailure;
    }
    result.finalize();
    run_hooks(&mut result, data.as_ref().map(|d| d as &dyn DataModel), hooks);
    (result, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescraper_api::{ExecutionStatus, SystemCompatibilityError};

    #[derive(Debug)]
    struct Dummy;
    impl DataModel for Dummy {
        fn model_name(&self) -> &'static str {
            "Dummy"
        }
        fn to_json(&self) -> serde_json::Value {
            json!({})
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn void_task_maps_error_to_execution_failure() {
        let result = run_void_task("t", None, None, &[], |_r| anyhow::bail!("boom"));
        assert_eq!(result.status, ExecutionStatus::ExecutionFailure);
        assert_eq!(result.events.len(), 1);
    }

    #[test]
    fn void_task_preserves_ok_status() {
        let result = run_void_task("t", None, None, &[], |_r| Ok(()));
        assert_eq!(result.status, ExecutionStatus::Ok);
    }

    #[test]
    fn collect_task_forces_failure_on_none_with_unset_status() {
        let (result, data) = run_collect_task::<Dummy, _>("t", None, None, &[], |_r| Ok(None));
        assert_eq!(result.status, ExecutionStatus::ExecutionFailure);
        assert!(data.is_none());
    }

    #[test]
    fn collect_task_honors_explicit_not_ran_on_none() {
        let (result, data) = run_collect_task::<Dummy, _>("t", None, None, &[], |r| {
            r.status = ExecutionStatus::NotRan;
            Ok(None)
        });
        assert_eq!(result.status, ExecutionStatus::NotRan);
        assert!(data.is_none());
    }

    #[test]
    fn collect_task_maps_incompatibility_error_to_execution_failure() {
        let (result, _data) = run_collect_task::<Dummy, _>("t", None, None, &[], |_r| {
            Err(SystemCompatibilityError::UnsupportedOsFamily(nodescraper_api::OsFamily::Windows).into())
        });
        assert_eq!(result.status, ExecutionStatus::ExecutionFailure);
    }

    #[test]
    fn collect_task_returns_data_on_success() {
        let (result, data) = run_collect_task("t", None, None, &[], |_r| Ok(Some(Dummy)));
        assert_eq!(result.status, ExecutionStatus::Ok);
        assert!(data.is_some());
    }

    #[test]
    fn panics_are_caught_and_reported_as_execution_failure() {
        let result = run_void_task("t", None, None, &[], |_r| panic!("unexpected"));
        assert_eq!(result.status, ExecutionStatus::ExecutionFailure);
    }

    #[test]
    fn truncate_leaves_short_ascii_untouched() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_cuts_long_ascii_at_max() {
        let message = "a".repeat(10);
        assert_eq!(truncate(&message, 4), "aaaa... [truncated]");
    }

    #[test]
    fn truncate_does_not_split_a_multibyte_char_straddling_max() {
        // Each '\u{e9}' (e-acute) is 2 bytes; with max=5 the boundary falls
        // inside the third character, so it must be dropped whole rather than
        // byte-sliced.
        let message = "\u{e9}\u{e9}\u{e9}\u{e9}";
        let truncated = truncate(message, 5);
        assert!(truncated.starts_with("\u{e9}\u{e9}..."));
    }
}
