#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fleet_scheduler::api::world_dto::{JobDto, NodeDto, PhaseReadingDto, TargetDto, WorldDto};
use fleet_scheduler::domain::batch::phase::PhaseKind;
use fleet_scheduler::domain::scheduler::config::SchedulerConfig;
use fleet_scheduler::domain::scheduler::task::{Task, TaskArg};
use fleet_scheduler::domain::scheduler::workload_manager::{ManagerContext, WorkloadManager};
use fleet_scheduler::domain::simulator::simulator::SystemSimulator;
use fleet_scheduler::domain::simulator::simulator_mock::MockSimulator;
use fleet_scheduler::domain::utils::id::{JobId, NodeName, TargetId};
use fleet_scheduler::domain::world::dispatch::DispatchSink;
use fleet_scheduler::domain::world::oracle::{JobCostOracle, PhaseOracle, TargetState};
use fleet_scheduler::domain::world::simulated_world::SimulatedWorld;

/// Sink that refuses every launch but remembers the attempts.
#[derive(Debug, Default)]
pub struct FailingSink {
    pub attempts: Mutex<Vec<NodeName>>,
}

impl DispatchSink for FailingSink {
    fn launch(&self, _job: &JobId, node: &NodeName, _concurrency: i64, _args: &[TaskArg], _tag: u64) -> bool {
        self.attempts.lock().unwrap().push(node.clone());
        false
    }
}

/// Phase oracle answering from fixed tables.
#[derive(Debug, Default)]
pub struct ScriptedPhases {
    pub effects: HashMap<PhaseKind, f64>,
    pub durations: HashMap<PhaseKind, f64>,
    pub resource_ratio: Mutex<f64>,
}

impl ScriptedPhases {
    pub fn new(effects: [f64; 3], durations: [f64; 3], resource_ratio: f64) -> Self {
        ScriptedPhases {
            effects: PhaseKind::ALL.into_iter().zip(effects).collect(),
            durations: PhaseKind::ALL.into_iter().zip(durations).collect(),
            resource_ratio: Mutex::new(resource_ratio),
        }
    }
}

impl PhaseOracle for ScriptedPhases {
    fn effect_per_unit_power(&self, _target: &TargetId, phase: PhaseKind) -> f64 {
        self.effects.get(&phase).copied().unwrap_or(0.0)
    }

    fn duration_of(&self, _target: &TargetId, phase: PhaseKind) -> f64 {
        self.durations.get(&phase).copied().unwrap_or(0.0)
    }

    fn target_state(&self, _target: &TargetId) -> TargetState {
        TargetState { resource_ratio: *self.resource_ratio.lock().unwrap() }
    }
}

#[derive(Debug)]
pub struct FixedCosts(pub f64);

impl JobCostOracle for FixedCosts {
    fn cost_of(&self, _job: &JobId) -> f64 {
        self.0
    }
}

pub fn job(id: &str, cost: f64) -> JobDto {
    JobDto::new(id, cost)
}

pub fn reading(effect_per_power: f64, duration: f64) -> PhaseReadingDto {
    PhaseReadingDto { effect_per_power, duration }
}

pub fn target(id: &str, resource_ratio: f64) -> TargetDto {
    TargetDto {
        id: id.to_string(),
        resource_ratio,
        corrective: reading(0.05, 4000.0),
        replenishment: reading(0.02, 3200.0),
        extraction: reading(0.03, 1000.0),
    }
}

/// A world rooted at the first node, each node linked to the next one.
pub fn chain_world(mut nodes: Vec<NodeDto>, jobs: Vec<JobDto>, targets: Vec<TargetDto>) -> SimulatedWorld {
    let names: Vec<String> = nodes.iter().map(|node| node.name.clone()).collect();
    for (node, next) in nodes.iter_mut().zip(names.iter().skip(1)) {
        node.neighbours.push(next.clone());
    }

    let root = names.first().cloned().unwrap_or_default();
    SimulatedWorld::from_dto(WorldDto { root, nodes, jobs, targets, duration_jitter: 0.0, seed: 42 }).unwrap()
}

pub fn manager_with(world: &SimulatedWorld, sink: Arc<dyn DispatchSink>, simulator: Arc<dyn SystemSimulator>, config: SchedulerConfig) -> WorkloadManager {
    let config = SchedulerConfig { root_node: world.root(), ..config };
    let context = ManagerContext::new(Arc::new(world.clone()), sink, simulator, config);
    let mut manager = WorkloadManager::new(context);
    manager.update_network();
    manager
}

pub fn manager(world: &SimulatedWorld) -> WorkloadManager {
    manager_with(world, Arc::new(world.clone()), Arc::new(MockSimulator::new(0)), SchedulerConfig::default())
}

pub fn work(world: &SimulatedWorld, job: &str, power: i64) -> Task {
    Task::new(JobId::new(job), power, vec![], world).unwrap()
}
