use std::sync::Arc;
use std::time::Duration;

use crate::domain::batch::batch_generator::BatchGenerator;
use crate::domain::batch::phase::PhaseKind;
use crate::domain::scheduler::workload_manager::WorkloadManager;
use crate::domain::simulator::simulator::SystemSimulator;
use crate::domain::utils::id::TargetId;
use crate::domain::utils::statistics::{self, StatParameter, StatisticEvent};
use crate::error::Result;

/// A target and the time until which its last batch is still running.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSlot {
    pub id: TargetId,
    pub busy_until: i64,
}

/// What one tick of the driver loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Batches handed to the manager.
    pub assigned: usize,
    /// Targets still busy with an earlier batch.
    pub skipped: usize,
    /// Targets whose batch did not fit into the free capacity; they are retried on a later tick.
    pub deferred: usize,
    pub power_delivered: i64,
}

/// Drives the batch generator and the workload manager over a fixed set of targets.
///
/// There is no completion signal from the nodes: a target counts as busy for a fixed window
/// after its batch was assigned.
#[derive(Debug)]
pub struct Overseer {
    manager: WorkloadManager,
    generator: BatchGenerator,
    targets: Vec<TargetSlot>,
    simulator: Arc<dyn SystemSimulator>,
    tick: u64,
}

impl Overseer {
    pub fn new(manager: WorkloadManager, generator: BatchGenerator, targets: Vec<TargetId>) -> Self {
        let simulator = Arc::clone(manager.simulator());
        let targets = targets.into_iter().map(|id| TargetSlot { id, busy_until: 0 }).collect();
        Overseer { manager, generator, targets, simulator, tick: 0 }
    }

    /// Sends one preparation batch to every target and blocks each target until its corrective
    /// and replenishment phases are done. Returns the power delivered over all targets.
    pub fn prepare(&mut self) -> Result<i64> {
        let spacing = self.generator.config().spacing;
        let mut delivered = 0;

        for slot in self.targets.iter_mut() {
            let generated = self.generator.generate(&slot.id, true)?;
            let requested = generated.batch.power_needed();

            let longest = [PhaseKind::Corrective, PhaseKind::Replenishment]
                .iter()
                .filter_map(|kind| generated.plan.phase(*kind).map(|phase| phase.duration))
                .fold(0.0, f64::max);

            let mut workload = generated.into_workload();
            let result = self.manager.assign(&mut workload, false);
            delivered += result.power_delivered;

            slot.busy_until = self.simulator.get_current_time_in_ms() + (longest + spacing).ceil() as i64;

            if result.power_delivered < requested {
                log::warn!("{} could not be fully prepared ({} of {} power)", slot.id, result.power_delivered, requested);
            }
        }

        log::info!("Prepared {} targets, {} power delivered", self.targets.len(), delivered);
        Ok(delivered)
    }

    /// Runs one round over all targets. Every `refresh_every_ticks` ticks the network is
    /// rediscovered first.
    pub fn tick(&mut self) -> Result<TickReport> {
        let config = self.manager.config().clone();
        let mut report = TickReport { tick: self.tick, ..Default::default() };

        if self.tick > 0 && self.tick % config.refresh_every_ticks == 0 {
            self.manager.update_network();
        }

        let now = self.simulator.get_current_time_in_ms();

        for slot in self.targets.iter_mut() {
            if now < slot.busy_until {
                report.skipped += 1;
                continue;
            }

            let generated = self.generator.generate(&slot.id, false)?;
            let required = generated.memory_required();
            let mut available = self.manager.cached_available_capacity();
            if available < required {
                // Memory of finished jobs only shows up after a refresh.
                available = self.manager.available_capacity();
            }

            if available < required {
                log::info!("Could not assign a batch to {} ({:.2}/{:.2} units)", slot.id, available, required);
                report.deferred += 1;
                Self::record_deferred(&slot.id, required, available, self.manager.cached_total_capacity());
                continue;
            }

            let mut workload = generated.into_workload();
            let result = self.manager.assign(&mut workload, false);
            report.assigned += 1;
            report.power_delivered += result.power_delivered;
            slot.busy_until = now + config.target_cooldown_ms;
        }

        log::debug!(
            "Tick {}: {} assigned, {} skipped, {} deferred, {} power",
            report.tick,
            report.assigned,
            report.skipped,
            report.deferred,
            report.power_delivered
        );

        self.tick += 1;
        Ok(report)
    }

    /// Calls [`Overseer::tick`] `ticks` times, sleeping `tick_interval_ms` after each one.
    pub async fn run(&mut self, ticks: u64) -> Result<Vec<TickReport>> {
        let interval = Duration::from_millis(self.manager.config().tick_interval_ms);
        let mut reports = Vec::new();

        for _ in 0..ticks {
            reports.push(self.tick()?);
            tokio::time::sleep(interval).await;
        }

        Ok(reports)
    }

    fn record_deferred(target: &TargetId, required: f64, available: f64, total: f64) {
        if !statistics::is_global_enabled() {
            return;
        }

        let mut event = StatisticEvent::new();
        event
            .set(StatParameter::LogDescription, "Batch deferred")
            .set(StatParameter::Target, target.to_string())
            .set(StatParameter::Operation, "tick")
            .set(StatParameter::AvailableCapacity, available)
            .set(StatParameter::TotalCapacity, total)
            .set(StatParameter::Outcome, format!("needs {:.2} units", required));
        statistics::add_global_event(event);
    }

    pub fn manager(&self) -> &WorkloadManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut WorkloadManager {
        &mut self.manager
    }

    pub fn targets(&self) -> &[TargetSlot] {
        &self.targets
    }

    pub fn ticks_run(&self) -> u64 {
        self.tick
    }
}
