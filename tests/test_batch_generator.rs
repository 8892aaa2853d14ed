mod common;

use std::sync::Arc;

use fleet_scheduler::api::world_dto::NodeDto;
use fleet_scheduler::domain::batch::batch_config::{BatchConfig, PhaseJobs};
use fleet_scheduler::domain::batch::batch_generator::{BatchGenerator, GeneratedBatch, PhasePowers};
use fleet_scheduler::domain::batch::phase::{PhaseKind, phase_delays};
use fleet_scheduler::domain::scheduler::task::{Task, TaskArg};
use fleet_scheduler::domain::utils::id::TargetId;
use fleet_scheduler::domain::world::topology::NodeCategory;

use common::{FixedCosts, ScriptedPhases, chain_world, job, target};

const READINGS: [f64; 3] = [0.05, 0.02, 0.03];
const DURATIONS: [f64; 3] = [4000.0, 3200.0, 1000.0];

fn generator(phases: ScriptedPhases, config: BatchConfig) -> BatchGenerator {
    BatchGenerator::new(config, PhaseJobs::default(), Arc::new(phases), Arc::new(FixedCosts(1.75)))
}

fn n00dles() -> TargetId {
    TargetId::new("n00dles")
}

fn tasks(generated: &GeneratedBatch) -> Vec<&Task> {
    generated.batch.children().iter().filter_map(|child| child.as_task()).collect()
}

#[test]
fn steady_state_powers_follow_the_readings() {
    let generator = generator(ScriptedPhases::new(READINGS, DURATIONS, 1.0), BatchConfig::default());

    let powers = generator.phase_powers(&n00dles(), false);
    assert_eq!(powers, PhasePowers { corrective: 2, replenishment: 14, extraction: 7 });
}

#[test]
fn preparation_restores_without_extracting() {
    let generator = generator(ScriptedPhases::new(READINGS, DURATIONS, 0.5), BatchConfig::default());

    let generated = generator.generate(&n00dles(), true).unwrap();
    assert_eq!(generated.plan.total_power(), 58);
    assert_eq!(generated.plan.phase(PhaseKind::Corrective).unwrap().power, 5);
    assert_eq!(generated.plan.phase(PhaseKind::Replenishment).unwrap().power, 53);
    assert!(generated.plan.phase(PhaseKind::Extraction).is_none());
    assert_eq!(generated.batch.len(), 2);
}

#[test]
fn preparing_a_full_target_needs_no_power() {
    let generator = generator(ScriptedPhases::new(READINGS, DURATIONS, 1.0), BatchConfig::default());

    let powers = generator.phase_powers(&n00dles(), true);
    assert_eq!(powers, PhasePowers::default());
}

#[test]
fn degenerate_readings_fall_back_to_nominal_power() {
    let generator = generator(ScriptedPhases::new([0.0, f64::NAN, 1e-12], [0.0; 3], 0.0), BatchConfig::default());

    let powers = generator.phase_powers(&n00dles(), false);
    assert_eq!(powers, PhasePowers { corrective: 1, replenishment: 3, extraction: 2 });

    let generated = generator.generate(&n00dles(), false).unwrap();
    assert_eq!(generated.batch.len(), 3);
}

#[test]
fn phases_are_delayed_so_they_finish_in_order() {
    let generator = generator(ScriptedPhases::new(READINGS, DURATIONS, 1.0), BatchConfig::default());
    let generated = generator.generate(&n00dles(), false).unwrap();

    let delays: Vec<f64> = generated.plan.phases.iter().map(|phase| phase.delay).collect();
    assert_eq!(delays, vec![0.0, 850.0, 3100.0]);
    assert_eq!(generated.plan.span(), 4100.0);

    let tasks = tasks(&generated);
    let jobs: Vec<&str> = tasks.iter().map(|task| task.job.as_str()).collect();
    assert_eq!(jobs, vec!["weaken.js", "grow.js", "hack.js"]);
    assert_eq!(tasks[1].args, vec![TaskArg::from("n00dles"), TaskArg::Float(850.0)]);
}

#[test]
fn finish_order_holds_for_any_durations() {
    let gap = 50.0;
    let samples = [0.0, 1.0, 49.0, 50.0, 120.0, 999.5, 3000.0, 12000.0];

    for corrective in samples {
        for replenishment in samples {
            for extraction in samples {
                let delays = phase_delays(corrective, replenishment, extraction, gap);
                let corrective_finish = delays.corrective + corrective;
                let replenishment_finish = delays.replenishment + replenishment;
                let extraction_finish = delays.extraction + extraction;

                assert_eq!(delays.corrective, 0.0);
                assert!(delays.replenishment >= 0.0 && delays.extraction >= 0.0);
                assert!(
                    corrective_finish + gap <= replenishment_finish + 1e-9,
                    "replenishment finished too early for {:?}",
                    (corrective, replenishment, extraction)
                );
                assert!(
                    replenishment_finish + gap <= extraction_finish + 1e-9,
                    "extraction finished too early for {:?}",
                    (corrective, replenishment, extraction)
                );
            }
        }
    }
}

#[test]
fn waves_are_offset_by_the_spacing() {
    let config = BatchConfig { waves: 2, ..Default::default() };
    let generator = generator(ScriptedPhases::new(READINGS, DURATIONS, 1.0), config);
    let generated = generator.generate(&n00dles(), false).unwrap();

    assert_eq!(generated.batch.len(), 6);
    let second_wave: Vec<f64> = generated.plan.phases.iter().filter(|phase| phase.wave == 1).map(|phase| phase.delay).collect();
    assert_eq!(second_wave, vec![150.0, 1000.0, 3250.0]);
    assert_eq!(generated.plan.total_power(), 46);
}

#[test]
fn extraction_avoids_privileged_nodes() {
    let generator = generator(ScriptedPhases::new(READINGS, DURATIONS, 1.0), BatchConfig::default());
    let generated = generator.generate(&n00dles(), false).unwrap();
    let children = tasks(&generated);

    assert!(children[0].policy.is_none());
    assert!(children[1].policy.is_none());
    let policy = children[2].policy.as_ref().unwrap();
    assert!(policy.forbidden_categories.contains(NodeCategory::PRIVILEGED));

    let relaxed = BatchGenerator::new(
        BatchConfig { extraction_forbids_privileged: false, ..Default::default() },
        PhaseJobs::default(),
        Arc::new(ScriptedPhases::new(READINGS, DURATIONS, 1.0)),
        Arc::new(FixedCosts(1.75)),
    );
    let generated = relaxed.generate(&n00dles(), false).unwrap();
    assert!(tasks(&generated).iter().all(|task| task.policy.is_none()));
}

#[test]
fn memory_requirement_uses_the_job_costs() {
    let generator = generator(ScriptedPhases::new(READINGS, DURATIONS, 1.0), BatchConfig::default());
    let generated = generator.generate(&n00dles(), false).unwrap();

    assert!(tasks(&generated).iter().all(|task| task.cost() == 1.75));
    assert_eq!(generated.memory_required(), 23.0 * 1.75);
}

#[test]
fn simulated_world_drives_the_generator() {
    let world = chain_world(
        vec![NodeDto::new("home", 64.0)],
        vec![job("weaken.js", 1.75), job("grow.js", 1.75), job("hack.js", 1.7)],
        vec![target("n00dles", 0.5)],
    );
    let generator = BatchGenerator::new(BatchConfig::default(), PhaseJobs::default(), Arc::new(world.clone()), Arc::new(world.clone()));

    let prepared = generator.generate(&n00dles(), true).unwrap();
    assert_eq!(prepared.plan.total_power(), 58);

    world.set_resource_ratio(&n00dles(), 1.0).unwrap();
    let steady = generator.generate(&n00dles(), false).unwrap();
    let costs: Vec<f64> = tasks(&steady).iter().map(|task| task.cost()).collect();
    assert_eq!(costs, vec![1.75, 1.75, 1.7]);
    assert_eq!(steady.plan.total_power(), 23);
}
