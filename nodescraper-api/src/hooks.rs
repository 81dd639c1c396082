//! Post-processing invoked after every `TaskResult::finalize()`.

use crate::data_model::DataModel;
use crate::task_result::TaskResult;

/// Hooks must not raise: an error from a hook is logged by the caller but
/// does not affect the task result already produced.
pub trait TaskResultHook: Send + Sync {
    fn process_result(&self, result: &mut TaskResult, data: Option<&dyn DataModel>) -> anyhow::Result<()>;
}
