use serde::Serialize;
use std::fmt;

use crate::domain::scheduler::policy::ExecutionPolicy;
use crate::domain::utils::id::JobId;
use crate::domain::world::oracle::JobCostOracle;
use crate::error::{Error, Result};

/// One positional argument handed to a launched job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskArg {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<&str> for TaskArg {
    fn from(v: &str) -> Self {
        TaskArg::Text(v.to_string())
    }
}

impl From<String> for TaskArg {
    fn from(v: String) -> Self {
        TaskArg::Text(v)
    }
}

impl From<i64> for TaskArg {
    fn from(v: i64) -> Self {
        TaskArg::Integer(v)
    }
}

impl From<f64> for TaskArg {
    fn from(v: f64) -> Self {
        TaskArg::Float(v)
    }
}

impl fmt::Display for TaskArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskArg::Text(t) => write!(f, "{}", t),
            TaskArg::Integer(i) => write!(f, "{}", i),
            TaskArg::Float(x) => write!(f, "{}", x),
        }
    }
}

/// A repeatable unit of work: which job to run, what one concurrent instance costs and how much
/// power is still missing.
///
/// `power_needed` is decremented while the task is assigned and may end up negative when a
/// multi-core node delivered more than was asked for; the overshoot is kept on purpose so that
/// callers can account for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub job: JobId,
    cost: f64,
    pub power_needed: i64,
    pub args: Vec<TaskArg>,
    pub policy: Option<ExecutionPolicy>,
}

impl Task {
    /// Builds a task, asking the oracle once for the memory cost of `job`.
    pub fn new(job: JobId, power_needed: i64, args: Vec<TaskArg>, costs: &dyn JobCostOracle) -> Result<Task> {
        let cost = costs.cost_of(&job);
        Self::with_cost(job, cost, power_needed, args)
    }

    pub fn with_cost(job: JobId, cost: f64, power_needed: i64, args: Vec<TaskArg>) -> Result<Task> {
        if cost.is_nan() || cost < 0.0 {
            return Err(Error::InvalidCost { job: job.to_string(), cost });
        }

        Ok(Task { job, cost, power_needed, args, policy: None })
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn is_satisfied(&self) -> bool {
        self.power_needed <= 0
    }

    /// Power delivered beyond what was requested.
    pub fn overshoot(&self) -> i64 {
        (-self.power_needed).max(0)
    }

    /// Memory needed to host the remaining power on single-core nodes.
    pub fn memory_required(&self) -> f64 {
        self.cost * self.power_needed.max(0) as f64
    }

    /// Arguments for one launch, with the concurrency appended when the policy asks for it.
    pub fn launch_args(&self, concurrency: i64) -> Vec<TaskArg> {
        let mut args = self.args.clone();
        if self.policy.as_ref().is_some_and(|policy| policy.forward_concurrency) {
            args.push(TaskArg::Integer(concurrency));
        }
        return args;
    }

    pub fn describe(&self) -> String {
        let args: Vec<String> = self.args.iter().map(|arg| arg.to_string()).collect();
        format!("{} {} [{}] ({} units)", self.job, self.power_needed, args.join(", "), self.cost)
    }
}

/// Ordered group of workloads. Assigning a batch assigns each child on its own, children are
/// never co-located on purpose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    children: Vec<Workload>,
    cost: f64,
    power_needed: i64,
}

impl Batch {
    pub fn new(children: Vec<Workload>) -> Self {
        let mut batch = Batch::default();
        for child in children {
            batch.add(child);
        }
        return batch;
    }

    pub fn add(&mut self, child: impl Into<Workload>) {
        let child = child.into();
        self.cost += child.cost();
        self.power_needed += child.power_needed();
        self.children.push(child);
    }

    pub fn children(&self) -> &[Workload] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Workload] {
        &mut self.children
    }

    /// Sum of the children's cost when they were added.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Sum of the children's power requirement when they were added.
    pub fn power_needed(&self) -> i64 {
        self.power_needed
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Anything the workload manager can assign.
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    Task(Task),
    Batch(Batch),
}

impl Workload {
    pub fn cost(&self) -> f64 {
        match self {
            Workload::Task(task) => task.cost(),
            Workload::Batch(batch) => batch.cost(),
        }
    }

    pub fn power_needed(&self) -> i64 {
        match self {
            Workload::Task(task) => task.power_needed,
            Workload::Batch(batch) => batch.power_needed(),
        }
    }

    /// Power still missing right now, summed over all leaf tasks.
    pub fn remaining_power(&self) -> i64 {
        match self {
            Workload::Task(task) => task.power_needed.max(0),
            Workload::Batch(batch) => batch.children.iter().map(Workload::remaining_power).sum(),
        }
    }

    pub fn memory_required(&self) -> f64 {
        match self {
            Workload::Task(task) => task.memory_required(),
            Workload::Batch(batch) => batch.children.iter().map(Workload::memory_required).sum(),
        }
    }

    /// Leaf tasks in assignment order.
    pub fn leaves(&self) -> Vec<&Task> {
        match self {
            Workload::Task(task) => vec![task],
            Workload::Batch(batch) => batch.children.iter().flat_map(Workload::leaves).collect(),
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Workload::Task(task) => Some(task),
            Workload::Batch(_) => None,
        }
    }

    pub fn as_batch(&self) -> Option<&Batch> {
        match self {
            Workload::Task(_) => None,
            Workload::Batch(batch) => Some(batch),
        }
    }
}

impl From<Task> for Workload {
    fn from(task: Task) -> Self {
        Workload::Task(task)
    }
}

impl From<Batch> for Workload {
    fn from(batch: Batch) -> Self {
        Workload::Batch(batch)
    }
}
