use crate::domain::scheduler::task::TaskArg;
use crate::domain::utils::id::{JobId, NodeName};

/// The only side-effecting call of the scheduler: starts `concurrency` instances of `job` on `node`.
///
/// Returns `false` when the launch did not happen (node vanished, not enough memory, ...).
/// The scheduler never learns when a launched job finishes.
pub trait DispatchSink: std::fmt::Debug + Send + Sync {
    fn launch(&self, job: &JobId, node: &NodeName, concurrency: i64, args: &[TaskArg], tag: u64) -> bool;
}
