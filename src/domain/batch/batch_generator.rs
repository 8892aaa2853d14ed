use std::sync::Arc;

use crate::domain::batch::batch_config::{BatchConfig, PhaseJobs};
use crate::domain::batch::phase::{BatchPlan, PhaseKind, PhasePlan, phase_delays};
use crate::domain::scheduler::policy::ExecutionPolicy;
use crate::domain::scheduler::task::{Batch, Task, TaskArg, Workload};
use crate::domain::utils::id::TargetId;
use crate::domain::world::oracle::{JobCostOracle, PhaseOracle};
use crate::domain::world::topology::NodeCategory;
use crate::error::Result;

/// Effect readings at or below this are treated as no reading at all.
const NEAR_ZERO: f64 = 1e-9;

/// Power of each phase for one wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhasePowers {
    pub corrective: i64,
    pub replenishment: i64,
    pub extraction: i64,
}

impl PhasePowers {
    pub fn of(&self, kind: PhaseKind) -> i64 {
        match kind {
            PhaseKind::Corrective => self.corrective,
            PhaseKind::Replenishment => self.replenishment,
            PhaseKind::Extraction => self.extraction,
        }
    }
}

/// A batch ready to be assigned together with the plan it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedBatch {
    pub plan: BatchPlan,
    pub batch: Batch,
}

impl GeneratedBatch {
    /// Memory needed to host every phase on single-core nodes.
    pub fn memory_required(&self) -> f64 {
        self.batch.children().iter().map(Workload::memory_required).sum()
    }

    pub fn into_workload(self) -> Workload {
        Workload::Batch(self.batch)
    }
}

/// Builds multi-phase batches whose phases finish in a fixed order.
///
/// All phases of a batch are dispatched at the same time; the order of their completion comes
/// only from the start delays handed to each job as its second argument. Durations change with
/// the world, so the oracle is asked again for every batch.
#[derive(Debug, Clone)]
pub struct BatchGenerator {
    config: BatchConfig,
    jobs: PhaseJobs,
    phases: Arc<dyn PhaseOracle>,
    costs: Arc<dyn JobCostOracle>,
}

impl BatchGenerator {
    pub fn new(config: BatchConfig, jobs: PhaseJobs, phases: Arc<dyn PhaseOracle>, costs: Arc<dyn JobCostOracle>) -> Self {
        BatchGenerator { config, jobs, phases, costs }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Generates the next batch against `target`.
    ///
    /// In preparation mode the target is only brought back to full resource: there is no
    /// extraction phase. Degenerate oracle readings never fail, they produce a batch with
    /// nominal power instead.
    pub fn generate(&self, target: &TargetId, preparation: bool) -> Result<GeneratedBatch> {
        let powers = self.phase_powers(target, preparation);

        let corrective_time = self.phases.duration_of(target, PhaseKind::Corrective);
        let replenishment_time = self.phases.duration_of(target, PhaseKind::Replenishment);
        let extraction_time = self.phases.duration_of(target, PhaseKind::Extraction);
        let delays = phase_delays(corrective_time, replenishment_time, extraction_time, self.config.gap);

        let kinds: &[PhaseKind] = if preparation { &PhaseKind::ALL[..2] } else { &PhaseKind::ALL };

        let mut plan = BatchPlan { target: target.clone(), preparation, phases: Vec::new() };
        let mut batch = Batch::default();

        for wave in 0..self.config.waves {
            let offset = wave as f64 * self.config.spacing;

            for kind in kinds {
                let duration = match kind {
                    PhaseKind::Corrective => corrective_time,
                    PhaseKind::Replenishment => replenishment_time,
                    PhaseKind::Extraction => extraction_time,
                };
                let phase = PhasePlan {
                    kind: *kind,
                    wave,
                    power: powers.of(*kind),
                    duration: duration.max(0.0),
                    delay: delays.of(*kind) + offset,
                };

                batch.add(self.phase_task(target, &phase)?);
                plan.phases.push(phase);
            }
        }

        log::debug!(
            "Batch for {}: corrective {} (+{:.0}), replenishment {} (+{:.0}), extraction {} (+{:.0}){}",
            target,
            powers.corrective,
            delays.corrective,
            powers.replenishment,
            delays.replenishment,
            powers.extraction,
            delays.extraction,
            if preparation { " [preparation]" } else { "" }
        );

        Ok(GeneratedBatch { plan, batch })
    }

    /// Power each phase needs for one wave against `target`.
    pub fn phase_powers(&self, target: &TargetId, preparation: bool) -> PhasePowers {
        let config = &self.config;

        let extraction_rate = self.reading(target, PhaseKind::Extraction);
        let mut extraction =
            if extraction_rate > config.extraction_fraction { 1 } else { (config.extraction_fraction / extraction_rate).ceil() as i64 };

        let mut ratio = self.phases.target_state(target).resource_ratio;
        if !(ratio > 0.0) {
            ratio = config.state_floor;
        }
        let ratio = ratio.min(1.0);

        let mut restored = if preparation { (1.0 - ratio).max(config.extraction_fraction) } else { config.extraction_fraction };
        restored = restored.min(1.0 - config.state_floor);

        let replenishment = if preparation && ratio >= 1.0 {
            0
        } else {
            let target_growth = 1.0 / (1.0 - restored);
            let replenishment_rate = self.reading(target, PhaseKind::Replenishment);
            ((target_growth - 1.0) / replenishment_rate * config.replenishment_margin).ceil() as i64
        };

        if preparation {
            extraction = 0;
        }

        let side_effect = replenishment as f64 * config.replenishment_increment + extraction as f64 * config.extraction_increment;
        let corrective_rate = self.reading(target, PhaseKind::Corrective);
        let corrective = (side_effect / corrective_rate * config.corrective_margin).ceil() as i64;

        PhasePowers { corrective, replenishment, extraction }
    }

    /// Effect per unit of power, with degenerate readings replaced by the configured floor.
    fn reading(&self, target: &TargetId, kind: PhaseKind) -> f64 {
        let reading = self.phases.effect_per_unit_power(target, kind);
        if reading.is_finite() && reading > NEAR_ZERO {
            return reading;
        }

        log::debug!("Degenerate {} reading {} for {}, using {}", kind, reading, target, self.config.power_floor);
        self.config.power_floor
    }

    fn phase_task(&self, target: &TargetId, phase: &PhasePlan) -> Result<Task> {
        let args = vec![TaskArg::from(target.as_str()), TaskArg::Float(phase.delay)];
        let task = Task::new(self.jobs.job(phase.kind).clone(), phase.power, args, self.costs.as_ref())?;

        if phase.kind == PhaseKind::Extraction && self.config.extraction_forbids_privileged {
            return Ok(task.with_policy(ExecutionPolicy::default().forbidding(NodeCategory::PRIVILEGED)));
        }
        Ok(task)
    }
}
