use std::path::Path;
use std::sync::Arc;

use crate::api::config_dto::ConfigDto;
use crate::api::world_dto::WorldDto;
use crate::domain::batch::batch_config::{BatchConfig, PhaseJobs};
use crate::domain::batch::batch_generator::BatchGenerator;
use crate::domain::driver::overseer::Overseer;
use crate::domain::scheduler::config::SchedulerConfig;
use crate::domain::scheduler::workload_manager::{ManagerContext, WorkloadManager};
use crate::domain::simulator::simulator::SystemSimulator;
use crate::domain::world::simulated_world::SimulatedWorld;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

pub fn load_world(file_path: impl AsRef<Path>) -> Result<SimulatedWorld> {
    let dto: WorldDto = parse_json_file::<WorldDto>(file_path)?;
    log::info!("World file parsed successfully ({} nodes, {} targets).", dto.nodes.len(), dto.targets.len());

    SimulatedWorld::from_dto(dto)
}

/// Reads the configuration, or returns the defaults when no file is given.
pub fn load_config(file_path: Option<impl AsRef<Path>>) -> Result<ConfigDto> {
    match file_path {
        Some(path) => parse_json_file::<ConfigDto>(path),
        None => Ok(ConfigDto::default()),
    }
}

/// Wires a manager and a batch generator to `world`, discovers the network and targets every
/// target the world knows.
pub fn build_overseer(world: &SimulatedWorld, config: ConfigDto, simulator: Arc<dyn SystemSimulator>) -> Result<Overseer> {
    let scheduler_config = SchedulerConfig::try_from(config.scheduler)?;
    let batch_config = BatchConfig::try_from(config.batch)?;
    let jobs = PhaseJobs::from(config.jobs);

    world.set_clock(Arc::clone(&simulator));
    let context = ManagerContext::new(Arc::new(world.clone()), Arc::new(world.clone()), simulator, scheduler_config);
    let mut manager = WorkloadManager::new(context);
    manager.update_network();

    let generator = BatchGenerator::new(batch_config, jobs, Arc::new(world.clone()), Arc::new(world.clone()));

    Ok(Overseer::new(manager, generator, world.target_ids()))
}
