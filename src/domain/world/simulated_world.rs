use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::world_dto::{NodeDto, PhaseReadingDto, TargetDto, WorldDto};
use crate::domain::batch::phase::PhaseKind;
use crate::domain::scheduler::task::TaskArg;
use crate::domain::simulator::simulator::SystemSimulator;
use crate::domain::utils::id::{JobId, NodeName, TargetId};
use crate::domain::world::dispatch::DispatchSink;
use crate::domain::world::oracle::{JobCostOracle, PhaseOracle, TargetState};
use crate::domain::world::topology::{NodeCategory, NodeDescriptor, TopologySource};
use crate::error::{Error, Result};

/// One accepted launch.
#[derive(Debug, Clone, PartialEq)]
pub struct Launch {
    pub job: JobId,
    pub node: NodeName,
    pub concurrency: i64,
    pub args: Vec<TaskArg>,
    pub tag: u64,
}

#[derive(Debug, Clone)]
struct SimNode {
    name: NodeName,
    max_capacity: f64,
    base_used: f64,
    used_capacity: f64,
    cores: i64,
    categories: NodeCategory,
    admin_access: bool,
}

impl SimNode {
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            name: self.name.clone(),
            max_capacity: self.max_capacity,
            used_capacity: self.used_capacity,
            cores: self.cores,
            categories: self.categories,
            admin_access: self.admin_access,
        }
    }
}

#[derive(Debug, Clone)]
struct SimTarget {
    resource_ratio: f64,
    corrective: PhaseReadingDto,
    replenishment: PhaseReadingDto,
    extraction: PhaseReadingDto,
}

impl SimTarget {
    fn reading(&self, phase: PhaseKind) -> &PhaseReadingDto {
        match phase {
            PhaseKind::Corrective => &self.corrective,
            PhaseKind::Replenishment => &self.replenishment,
            PhaseKind::Extraction => &self.extraction,
        }
    }
}

/// Memory held by a launch until its job finishes.
#[derive(Debug, Clone)]
struct Running {
    node: NodeName,
    memory: f64,
    finishes_at: i64,
}

#[derive(Debug)]
struct WorldState {
    root: NodeName,
    nodes: HashMap<NodeName, SimNode>,
    links: HashMap<NodeName, Vec<NodeName>>,
    job_costs: HashMap<JobId, f64>,
    job_runtimes: HashMap<JobId, f64>,
    targets: HashMap<TargetId, SimTarget>,
    duration_jitter: f64,
    rng: StdRng,
    launches: Vec<Launch>,
    clock: Option<Arc<dyn SystemSimulator>>,
    running: Vec<Running>,
}

impl WorldState {
    /// Frees the memory of every launch whose job has finished by now.
    fn expire(&mut self) {
        let Some(clock) = &self.clock else {
            return;
        };
        let now = clock.get_current_time_in_ms();

        let (finished, running): (Vec<Running>, Vec<Running>) = self.running.drain(..).partition(|run| run.finishes_at <= now);
        self.running = running;

        for run in finished {
            if let Some(node) = self.nodes.get_mut(&run.node) {
                node.used_capacity = (node.used_capacity - run.memory).max(node.base_used);
            }
        }
    }
}

/// In-memory fleet that plays every external collaborator of the scheduler: topology source,
/// job cost oracle, phase oracle and dispatch sink.
///
/// Launches book their memory on the node right away, so the next read of the node sees it.
/// Once a clock is attached, jobs with a runtime give their memory back when they finish: after
/// their start delay (the first float argument) plus the runtime. Clones share the same world.
#[derive(Debug, Clone)]
pub struct SimulatedWorld {
    state: Arc<RwLock<WorldState>>,
}

impl SimulatedWorld {
    pub fn from_dto(dto: WorldDto) -> Result<Self> {
        let mut state = WorldState {
            root: NodeName::new(dto.root),
            nodes: HashMap::new(),
            links: HashMap::new(),
            job_costs: HashMap::new(),
            job_runtimes: HashMap::new(),
            targets: HashMap::new(),
            duration_jitter: dto.duration_jitter.abs(),
            rng: StdRng::seed_from_u64(dto.seed),
            launches: Vec::new(),
            clock: None,
            running: Vec::new(),
        };

        for node in dto.nodes {
            Self::insert_node(&mut state, node)?;
        }

        for job in dto.jobs {
            if job.cost.is_nan() || job.cost < 0.0 {
                return Err(Error::InvalidCost { job: job.id, cost: job.cost });
            }
            let id = JobId::new(job.id);
            if let Some(runtime) = job.runtime_ms.filter(|runtime| runtime.is_finite() && *runtime >= 0.0) {
                state.job_runtimes.insert(id.clone(), runtime);
            }
            state.job_costs.insert(id, job.cost);
        }

        for target in dto.targets {
            Self::insert_target(&mut state, target);
        }

        log::debug!("Simulated world with {} nodes and {} targets", state.nodes.len(), state.targets.len());
        Ok(SimulatedWorld { state: Arc::new(RwLock::new(state)) })
    }

    fn insert_node(state: &mut WorldState, dto: NodeDto) -> Result<()> {
        if dto.max_capacity.is_nan() || dto.max_capacity < 0.0 {
            return Err(Error::InvalidConfiguration(format!("Node {} has an invalid capacity {}", dto.name, dto.max_capacity)));
        }

        let name = NodeName::new(dto.name);
        let categories = NodeCategory::parse_all(&dto.categories)?;

        for neighbour in dto.neighbours {
            let neighbour = NodeName::new(neighbour);
            state.links.entry(name.clone()).or_default().push(neighbour.clone());
            state.links.entry(neighbour).or_default().push(name.clone());
        }

        let node = SimNode {
            name: name.clone(),
            max_capacity: dto.max_capacity,
            base_used: dto.used_capacity,
            used_capacity: dto.used_capacity,
            cores: dto.cores.max(1),
            categories,
            admin_access: dto.admin_access,
        };
        state.nodes.insert(name, node);
        Ok(())
    }

    fn insert_target(state: &mut WorldState, dto: TargetDto) {
        let target = SimTarget {
            resource_ratio: dto.resource_ratio,
            corrective: dto.corrective,
            replenishment: dto.replenishment,
            extraction: dto.extraction,
        };
        state.targets.insert(TargetId::new(dto.id), target);
    }

    fn read(&self) -> RwLockReadGuard<'_, WorldState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorldState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn root(&self) -> NodeName {
        self.read().root.clone()
    }

    pub fn target_ids(&self) -> Vec<TargetId> {
        let mut ids: Vec<TargetId> = self.read().targets.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every accepted launch so far, oldest first.
    pub fn launches(&self) -> Vec<Launch> {
        self.read().launches.clone()
    }

    /// Lets finished jobs release their memory, measured on `clock`.
    pub fn set_clock(&self, clock: Arc<dyn SystemSimulator>) {
        self.write().clock = Some(clock);
    }

    /// Lets every launched job finish, returning the nodes to their initial usage.
    pub fn release_all(&self) {
        let mut state = self.write();
        state.running.clear();
        for node in state.nodes.values_mut() {
            node.used_capacity = node.base_used;
        }
    }

    /// Adds a node, linked in through its `neighbours`, as if it had just been bought or unlocked.
    pub fn add_node(&self, dto: NodeDto) -> Result<()> {
        let mut state = self.write();
        Self::insert_node(&mut state, dto)
    }

    pub fn remove_node(&self, name: &NodeName) -> Result<()> {
        let mut state = self.write();
        if state.nodes.remove(name).is_none() {
            return Err(Error::NodeNotFound(name.to_string()));
        }
        Ok(())
    }

    pub fn set_used_capacity(&self, name: &NodeName, used: f64) -> Result<()> {
        let mut state = self.write();
        let node = state.nodes.get_mut(name).ok_or_else(|| Error::NodeNotFound(name.to_string()))?;
        node.used_capacity = used;
        node.base_used = used;
        Ok(())
    }

    pub fn set_admin_access(&self, name: &NodeName, admin_access: bool) -> Result<()> {
        let mut state = self.write();
        let node = state.nodes.get_mut(name).ok_or_else(|| Error::NodeNotFound(name.to_string()))?;
        node.admin_access = admin_access;
        Ok(())
    }

    pub fn set_resource_ratio(&self, target: &TargetId, ratio: f64) -> Result<()> {
        let mut state = self.write();
        let entry = state.targets.get_mut(target).ok_or_else(|| Error::TargetNotFound(target.to_string()))?;
        entry.resource_ratio = ratio;
        Ok(())
    }
}

impl TopologySource for SimulatedWorld {
    fn discover_nodes(&self, root: &NodeName) -> Vec<NodeDescriptor> {
        let mut state = self.write();
        state.expire();

        let mut found = Vec::new();
        let mut seen: HashSet<NodeName> = HashSet::new();
        let mut queue: VecDeque<NodeName> = VecDeque::from([root.clone()]);

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }

            // Links to removed nodes are dead ends.
            let Some(node) = state.nodes.get(&name) else {
                continue;
            };
            found.push(node.descriptor());

            if let Some(neighbours) = state.links.get(&name) {
                queue.extend(neighbours.iter().filter(|n| !seen.contains(*n)).cloned());
            }
        }

        return found;
    }

    fn read_node(&self, name: &NodeName) -> Option<NodeDescriptor> {
        let mut state = self.write();
        state.expire();
        state.nodes.get(name).map(SimNode::descriptor)
    }
}

impl JobCostOracle for SimulatedWorld {
    fn cost_of(&self, job: &JobId) -> f64 {
        match self.read().job_costs.get(job) {
            Some(cost) => *cost,
            None => {
                log::warn!("Unknown job {}, treating it as free", job);
                0.0
            }
        }
    }
}

impl PhaseOracle for SimulatedWorld {
    fn effect_per_unit_power(&self, target: &TargetId, phase: PhaseKind) -> f64 {
        self.read().targets.get(target).map(|t| t.reading(phase).effect_per_power).unwrap_or(0.0)
    }

    fn duration_of(&self, target: &TargetId, phase: PhaseKind) -> f64 {
        let mut state = self.write();
        let jitter = state.duration_jitter;

        let Some(duration) = state.targets.get(target).map(|t| t.reading(phase).duration) else {
            return 0.0;
        };

        if jitter <= 0.0 {
            return duration;
        }

        let factor = 1.0 + state.rng.random_range(-jitter..=jitter);
        (duration * factor).max(0.0)
    }

    fn target_state(&self, target: &TargetId) -> TargetState {
        let ratio = self.read().targets.get(target).map(|t| t.resource_ratio).unwrap_or(0.0);
        TargetState { resource_ratio: ratio }
    }
}

impl DispatchSink for SimulatedWorld {
    fn launch(&self, job: &JobId, node: &NodeName, concurrency: i64, args: &[TaskArg], tag: u64) -> bool {
        let mut state = self.write();
        state.expire();
        let cost = state.job_costs.get(job).copied().unwrap_or(0.0);
        let runtime = state.job_runtimes.get(job).copied();

        let Some(entry) = state.nodes.get_mut(node) else {
            return false;
        };

        let required = concurrency as f64 * cost;
        if concurrency < 1 || !entry.admin_access || entry.max_capacity - entry.used_capacity < required {
            return false;
        }
        entry.used_capacity += required;

        let now = state.clock.as_ref().map(|clock| clock.get_current_time_in_ms());
        if let (Some(runtime), Some(now)) = (runtime, now) {
            let delay = args.iter().find_map(|arg| if let TaskArg::Float(delay) = arg { Some(delay.max(0.0)) } else { None }).unwrap_or(0.0);
            let finishes_at = now + (delay + runtime).ceil() as i64;
            state.running.push(Running { node: node.clone(), memory: required, finishes_at });
        }

        state.launches.push(Launch { job: job.clone(), node: node.clone(), concurrency, args: args.to_vec(), tag });
        return true;
    }
}
