use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::scheduler::allocation::{AllocationOutcome, AllocationResult, BookkeepingMode, Placement};
use crate::domain::scheduler::config::SchedulerConfig;
use crate::domain::scheduler::node::Node;
use crate::domain::scheduler::node_pool::{NodeKey, NodePool};
use crate::domain::scheduler::task::{Task, Workload};
use crate::domain::simulator::simulator::SystemSimulator;
use crate::domain::utils::id::NodeName;
use crate::domain::utils::profiler::Profiler;
use crate::domain::utils::statistics::{self, ANALYTICS_TARGET, StatParameter, StatisticEvent};
use crate::domain::world::dispatch::DispatchSink;
use crate::domain::world::topology::TopologySource;

/// The external collaborators a manager talks to.
#[derive(Debug, Clone)]
pub struct ManagerContext {
    pub topology: Arc<dyn TopologySource>,
    pub sink: Arc<dyn DispatchSink>,
    pub simulator: Arc<dyn SystemSimulator>,
    pub config: SchedulerConfig,
}

impl ManagerContext {
    pub fn new(
        topology: Arc<dyn TopologySource>,
        sink: Arc<dyn DispatchSink>,
        simulator: Arc<dyn SystemSimulator>,
        config: SchedulerConfig,
    ) -> Self {
        ManagerContext { topology, sink, simulator, config }
    }
}

/// Owns the node pool and packs workloads onto it.
///
/// Allocation is first-fit over the pool order. Partial delivery is the normal result under
/// resource pressure and is reported through [`AllocationResult::outcome`], never as an error.
/// The manager assumes a single caller; nothing here is meant to be shared between threads.
#[derive(Debug)]
pub struct WorkloadManager {
    context: ManagerContext,
    nodes: NodePool,
    total_capacity: f64,
    available_capacity: f64,
    generation: u64,
    profiler: Profiler,
}

impl WorkloadManager {
    /// Creates a manager with an empty pool; call [`WorkloadManager::update_network`] to populate it.
    pub fn new(context: ManagerContext) -> Self {
        WorkloadManager {
            context,
            nodes: NodePool::new(),
            total_capacity: 0.0,
            available_capacity: 0.0,
            generation: 0,
            profiler: Profiler::new(),
        }
    }

    //------------------
    // --- Allocation ---
    //------------------

    /// Greedily packs `workload` onto the pool until every leaf task is satisfied, no eligible
    /// node is left or the allocation deadline passes.
    ///
    /// Leaf tasks have their `power_needed` decremented by what they received. With `fill_mode`
    /// every chosen node is filled completely regardless of the remaining power.
    pub fn assign(&mut self, workload: &mut Workload, fill_mode: bool) -> AllocationResult {
        let started = Instant::now();
        let requested = workload.remaining_power();
        let generation = self.next_generation();
        let deadline = self.deadline();

        let result = self.allocate(workload, fill_mode, generation, deadline);

        let elapsed = started.elapsed();
        self.profiler.record("assign", elapsed);
        self.report("assign", &Self::label(workload), requested, &result, elapsed);

        return result;
    }

    /// Starts one instance of `task` on every usable node its policy allows, ignoring the power it
    /// asks for. Nothing is retried.
    pub fn map(&mut self, task: &Task) -> AllocationResult {
        let started = Instant::now();
        let generation = self.next_generation();
        let sink = Arc::clone(&self.context.sink);
        let mut result = AllocationResult::new(generation);

        for key in self.nodes.keys() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };

            if !node.is_usable() || !node.matches_policy(task.policy.as_ref()) {
                continue;
            }

            node.execution_tag = generation;
            if node.dispatch(sink.as_ref(), task, 1) {
                result.place(node.name.clone(), 1, node.cores);
            }
        }

        self.update();

        if result.power_delivered == 0 {
            result.outcome = AllocationOutcome::Exhausted;
        }

        let elapsed = started.elapsed();
        self.report("map", task.job.as_str(), task.power_needed.max(0), &result, elapsed);
        return result;
    }

    /// Assigns copies of `task` round after round until the pool is exhausted.
    ///
    /// A round stops the loop when it is not satisfied, delivers nothing or leaves the cached
    /// available capacity where it was. The result carries the generation of the last round.
    pub fn fill(&mut self, task: &Task, fill_mode: bool) -> AllocationResult {
        let started = Instant::now();
        let mut result = AllocationResult::new(self.generation);
        let mut rounds = 0;

        while self.available_capacity >= task.cost() {
            let before = self.available_capacity;
            let mut round = Workload::Task(task.clone());
            let generation = self.next_generation();
            let deadline = self.deadline();

            let round_result = self.allocate(&mut round, fill_mode, generation, deadline);
            rounds += 1;

            if self.context.config.bookkeeping == BookkeepingMode::Strict {
                self.update();
            }

            let power = round_result.power_delivered;
            let outcome = round_result.outcome;
            result.generation = generation;
            result.merge(round_result);

            if outcome != AllocationOutcome::Satisfied || power == 0 || self.available_capacity >= before {
                break;
            }
        }

        if rounds == 0 {
            result.outcome = AllocationOutcome::Exhausted;
        }

        let elapsed = started.elapsed();
        log::debug!("Fill of {} ran {} rounds and delivered {} power", task.job, rounds, result.power_delivered);
        self.report("fill", task.job.as_str(), task.power_needed.max(0) * rounds.max(1), &result, elapsed);
        return result;
    }

    fn allocate(&mut self, workload: &mut Workload, fill_mode: bool, generation: u64, deadline: i64) -> AllocationResult {
        match workload {
            Workload::Task(task) => self.allocate_task(task, fill_mode, generation, deadline),
            Workload::Batch(batch) => {
                let mut result = AllocationResult::new(generation);
                for child in batch.children_mut() {
                    let child_result = self.allocate(child, fill_mode, generation, deadline);
                    result.merge(child_result);
                }
                result
            }
        }
    }

    fn allocate_task(&mut self, task: &mut Task, fill_mode: bool, generation: u64, deadline: i64) -> AllocationResult {
        let mut result = AllocationResult::new(generation);
        if task.is_satisfied() {
            return result;
        }

        // Nodes whose launch failed during this call; their capacity view did not change.
        let mut rejected: HashSet<NodeKey> = HashSet::new();

        loop {
            if self.context.simulator.get_current_time_in_ms() > deadline {
                tracing::warn!(job = %task.job, remaining = task.power_needed, "Allocation timed out before the task was satisfied");
                result.outcome = AllocationOutcome::TimedOut;
                break;
            }

            if self.context.config.bookkeeping == BookkeepingMode::Strict {
                self.update();
            }

            let Some(key) = self.first_fit(task, &rejected) else {
                log::debug!("No eligible node left for {} (missing {} power)", task.job, task.power_needed);
                result.outcome = AllocationOutcome::Exhausted;
                break;
            };

            match self.dispatch_on(key, task, fill_mode, generation) {
                Some(placement) => {
                    task.power_needed -= placement.power;
                    result.place(placement.node, placement.concurrency, placement.power);
                }
                None => {
                    rejected.insert(key);
                }
            }

            if task.is_satisfied() {
                break;
            }
        }

        return result;
    }

    /// First node in pool order that can host one instance of `task` and passes its policy.
    fn first_fit(&self, task: &Task, rejected: &HashSet<NodeKey>) -> Option<NodeKey> {
        self.nodes.keys().into_iter().find(|key| {
            if rejected.contains(key) {
                return false;
            }

            match self.nodes.get(*key) {
                Some(node) => node.is_usable() && node.available_capacity() >= task.cost() && node.matches_policy(task.policy.as_ref()),
                None => false,
            }
        })
    }

    fn dispatch_on(&mut self, key: NodeKey, task: &Task, fill_mode: bool, generation: u64) -> Option<Placement> {
        let sink = Arc::clone(&self.context.sink);
        let topology = Arc::clone(&self.context.topology);
        let node = self.nodes.get_mut(key)?;

        node.execution_tag = generation;

        let dispatched_at = Instant::now();
        let concurrency = if fill_mode {
            node.run_fully(sink.as_ref(), task)
        } else {
            let granted = node.grantable_concurrency(task);
            let concurrency = node.instances_for_power(granted);
            if node.dispatch(sink.as_ref(), task, concurrency) { concurrency } else { 0 }
        };
        self.profiler.record("dispatch", dispatched_at.elapsed());

        let refreshed_at = Instant::now();
        node.refresh(topology.as_ref());
        self.profiler.record("refresh", refreshed_at.elapsed());

        if concurrency == 0 {
            return None;
        }

        let placement = Placement { node: node.name.clone(), concurrency, power: concurrency.saturating_mul(node.cores) };

        match self.context.config.bookkeeping {
            BookkeepingMode::Optimistic => {
                let booked = concurrency as f64 * task.cost();
                self.available_capacity = (self.available_capacity - booked).max(0.0);
            }
            BookkeepingMode::Strict => self.recompute_totals(),
        }

        log::debug!("{} x{} on {} ({} power)", task.job, placement.concurrency, placement.node, placement.power);
        return Some(placement);
    }

    //----------------
    // --- Pool ---
    //----------------

    /// Re-reads every node and recomputes the cached capacity totals. Nodes that cannot be read
    /// are marked stale and stop counting towards the totals.
    pub fn update(&mut self) {
        let topology = Arc::clone(&self.context.topology);

        for key in self.nodes.keys() {
            if let Some(node) = self.nodes.get_mut(key) {
                let refreshed_at = Instant::now();
                if !node.refresh(topology.as_ref()) {
                    log::debug!("Node {} could not be read", node.name);
                }
                self.profiler.record("refresh", refreshed_at.elapsed());
            }
        }

        self.recompute_totals();
    }

    /// Rediscovers the network from the configured root, merges new nodes, drops nodes that
    /// vanished, lost admin access or have no capacity, and rebuilds the totals.
    pub fn update_network(&mut self) {
        let topology = Arc::clone(&self.context.topology);
        let reserve = self.context.config.privileged_reserve_fraction;

        let mut added = 0;
        for descriptor in topology.discover_nodes(&self.context.config.root_node) {
            if self.nodes.contains(&descriptor.name) {
                continue;
            }
            let (_, inserted) = self.nodes.insert(Node::from_descriptor(descriptor, reserve));
            if inserted {
                added += 1;
            }
        }

        self.update();

        let dropped = self.nodes.retain(|node| !node.stale && node.admin_access && node.max_capacity > 0.0);
        for name in &dropped {
            log::debug!("Dropped node {} from the pool", name);
        }

        self.recompute_totals();

        log::info!(
            "Network refreshed: {} nodes ({} new, {} dropped), {:.2} of {:.2} units available",
            self.nodes.len(),
            added,
            dropped.len(),
            self.available_capacity,
            self.total_capacity
        );
    }

    /// Adds `node` to the end of the pool unless its name is already known.
    pub fn add_node(&mut self, node: Node) -> bool {
        let (_, inserted) = self.nodes.insert(node);
        if inserted {
            self.update();
        }
        return inserted;
    }

    fn recompute_totals(&mut self) {
        let (total, available) = self.nodes.totals();
        self.total_capacity = total;
        self.available_capacity = available.min(total);
    }

    //-----------------
    // --- Queries ---
    //-----------------

    /// Refreshes the pool, then returns its total capacity.
    pub fn total_capacity(&mut self) -> f64 {
        self.update();
        self.total_capacity
    }

    /// Refreshes the pool, then returns its free capacity.
    pub fn available_capacity(&mut self) -> f64 {
        self.update();
        self.available_capacity
    }

    pub fn cached_total_capacity(&self) -> f64 {
        self.total_capacity
    }

    pub fn cached_available_capacity(&self) -> f64 {
        self.available_capacity
    }

    pub fn nodes(&self) -> &NodePool {
        &self.nodes
    }

    pub fn node(&self, name: &NodeName) -> Option<&Node> {
        self.nodes.get_by_name(name)
    }

    /// Generation used by the most recent allocation call.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.context.config
    }

    pub fn simulator(&self) -> &Arc<dyn SystemSimulator> {
        &self.context.simulator
    }

    /// Human readable pool status. `depth >= 1` adds one line per node.
    pub fn summary(&self, depth: u32) -> String {
        let mut summary = String::new();

        if depth >= 1 {
            for node in self.nodes.iter() {
                summary.push_str(&format!("{}: {}% of {} units\n", node.name, node.occupancy(), node.max_capacity));
            }
        }

        let used = if self.total_capacity > 0.0 { 100.0 - (self.available_capacity / self.total_capacity * 100.0).round() } else { 0.0 };

        summary.push_str(&format!("TOTAL: {} nodes, {:.2} units available ({}% used)\n", self.nodes.len(), self.available_capacity, used));
        return summary;
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn deadline(&self) -> i64 {
        self.context.simulator.get_current_time_in_ms() + self.context.config.assign_timeout_ms
    }

    fn label(workload: &Workload) -> String {
        match workload {
            Workload::Task(task) => task.job.to_string(),
            Workload::Batch(batch) => format!("batch[{}]", batch.len()),
        }
    }

    fn report(&self, operation: &str, job: &str, requested: i64, result: &AllocationResult, elapsed: Duration) {
        tracing::info!(
            target: ANALYTICS_TARGET,
            LogDescription = "Allocation finished",
            Operation = operation,
            Job = job,
            Generation = result.generation,
            PowerRequested = requested,
            PowerDelivered = result.power_delivered,
            Outcome = %result.outcome,
            Placements = result.placements.len(),
            ProcessingTime = elapsed.as_micros() as u64,
            AvailableCapacity = self.available_capacity,
            TotalCapacity = self.total_capacity,
        );

        if statistics::is_global_enabled() {
            let mut event = StatisticEvent::new();
            event
                .set(StatParameter::LogDescription, "Allocation finished")
                .set(StatParameter::Operation, operation)
                .set(StatParameter::PowerRequested, requested)
                .set(StatParameter::PowerDelivered, result.power_delivered)
                .set(StatParameter::Outcome, result.outcome.to_string())
                .set(StatParameter::ProcessingTime, elapsed.as_micros() as u64)
                .set(StatParameter::AvailableCapacity, self.available_capacity)
                .set(StatParameter::TotalCapacity, self.total_capacity);
            statistics::add_global_event(event);
        }
    }
}
