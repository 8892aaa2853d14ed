use crate::domain::scheduler::policy::ExecutionPolicy;
use crate::domain::scheduler::task::Task;
use crate::domain::utils::id::NodeName;
use crate::domain::world::dispatch::DispatchSink;
use crate::domain::world::topology::{NodeCategory, NodeDescriptor, TopologySource};

/// A worker of the fleet as last seen by the scheduler.
///
/// Capacity is a cached view: launching work does not change it, only the next `refresh`
/// observes the memory the launched instances occupy.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: NodeName,
    pub max_capacity: f64,
    pub used_capacity: f64,
    /// Power delivered by one concurrent instance, independent of its memory cost.
    pub cores: i64,
    pub categories: NodeCategory,
    pub admin_access: bool,
    /// Written on every assignment so that repeated launches with identical args stay distinct.
    pub execution_tag: u64,
    /// Set when the last refresh could not read the node. Stale nodes are skipped until the next
    /// network refresh drops them.
    pub stale: bool,
    reserve_fraction: f64,
}

impl Node {
    /// An unread node; it has no capacity until the first `refresh`.
    pub fn new(name: NodeName, reserve_fraction: f64) -> Self {
        Node {
            name,
            max_capacity: 0.0,
            used_capacity: 0.0,
            cores: 1,
            categories: NodeCategory::NONE,
            admin_access: false,
            execution_tag: 0,
            stale: false,
            reserve_fraction,
        }
    }

    pub fn from_descriptor(descriptor: NodeDescriptor, reserve_fraction: f64) -> Self {
        let mut node = Node::new(descriptor.name.clone(), reserve_fraction);
        node.apply(descriptor);
        return node;
    }

    /// Privileged nodes keep `reserve_fraction` of their memory for the coordinator itself.
    fn apply(&mut self, descriptor: NodeDescriptor) {
        let reserve =
            if descriptor.categories.contains(NodeCategory::PRIVILEGED) { descriptor.max_capacity * self.reserve_fraction } else { 0.0 };

        self.max_capacity = (descriptor.max_capacity - reserve).max(0.0);
        self.used_capacity = descriptor.used_capacity.max(0.0);
        self.cores = descriptor.cores.max(1);
        self.categories = descriptor.categories;
        self.admin_access = descriptor.admin_access;
        self.stale = false;
    }

    /// Re-reads capacity, categories and admin access. Returns `false` if the node could not be
    /// read, leaving the previous view in place.
    pub fn refresh(&mut self, topology: &dyn TopologySource) -> bool {
        match topology.read_node(&self.name) {
            Some(descriptor) => {
                self.apply(descriptor);
                true
            }
            None => {
                self.stale = true;
                false
            }
        }
    }

    pub fn available_capacity(&self) -> f64 {
        (self.max_capacity - self.used_capacity).max(0.0)
    }

    /// Percentage of memory in use.
    pub fn occupancy(&self) -> f64 {
        if self.max_capacity <= 0.0 {
            return 0.0;
        }
        (self.used_capacity / self.max_capacity * 100.0).round()
    }

    pub fn is_usable(&self) -> bool {
        self.admin_access && !self.stale
    }

    /// Instances of `task` that fit into the free memory. Zero-cost tasks always fit.
    pub fn max_concurrency(&self, task: &Task) -> i64 {
        if task.cost() <= 0.0 {
            return i64::MAX;
        }
        (self.available_capacity() / task.cost()).floor() as i64
    }

    /// The power this node offers to `task`, clamped to what the task still needs.
    /// Nothing is reserved.
    pub fn grantable_concurrency(&self, task: &Task) -> i64 {
        let offer = self.max_concurrency(task).saturating_mul(self.cores);
        offer.min(task.power_needed.max(0))
    }

    /// Instances needed to deliver `power` on this node, rounded up so multi-core nodes may overshoot.
    pub fn instances_for_power(&self, power: i64) -> i64 {
        if power <= 0 {
            return 0;
        }
        power / self.cores + i64::from(power % self.cores != 0)
    }

    /// Launches `concurrency` instances of `task` tagged with the current execution tag.
    pub fn dispatch(&mut self, sink: &dyn DispatchSink, task: &Task, concurrency: i64) -> bool {
        if concurrency < 1 {
            return false;
        }

        let args = task.launch_args(concurrency);
        let launched = sink.launch(&task.job, &self.name, concurrency, &args, self.execution_tag);

        if !launched {
            log::warn!("Failed to run {} x{} on {}", task.job, concurrency, self.name);
        }
        return launched;
    }

    /// Fills all free memory with `task`, ignoring how much power it still needs.
    ///
    /// Returns the instances launched, zero when the launch failed.
    pub fn run_fully(&mut self, sink: &dyn DispatchSink, task: &Task) -> i64 {
        let concurrency = if task.cost() <= 0.0 { self.instances_for_power(task.power_needed).max(1) } else { self.max_concurrency(task) };

        if self.dispatch(sink, task, concurrency) { concurrency } else { 0 }
    }

    pub fn matches_policy(&self, policy: Option<&ExecutionPolicy>) -> bool {
        let Some(policy) = policy else {
            return true;
        };

        if self.categories.intersects(policy.forbidden_categories) {
            return false;
        }

        if let Some(allowed) = &policy.allowed_names {
            if !allowed.contains(&self.name) {
                return false;
            }
        }

        return true;
    }
}
