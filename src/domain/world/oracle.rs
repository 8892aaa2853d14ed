use crate::domain::batch::phase::PhaseKind;
use crate::domain::utils::id::{JobId, TargetId};

/// Memory units one concurrent instance of a job occupies on a node.
pub trait JobCostOracle: std::fmt::Debug + Send + Sync {
    fn cost_of(&self, job: &JobId) -> f64;
}

/// Snapshot of a target as seen by the phase oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetState {
    /// Current resource as a fraction of its maximum, `1.0` means full.
    pub resource_ratio: f64,
}

/// Predicts the effect and duration of each phase against a target.
///
/// Readings depend on mutable world state and must be queried again for every batch.
pub trait PhaseOracle: std::fmt::Debug + Send + Sync {
    fn effect_per_unit_power(&self, target: &TargetId, phase: PhaseKind) -> f64;
    fn duration_of(&self, target: &TargetId, phase: PhaseKind) -> f64;
    fn target_state(&self, target: &TargetId) -> TargetState;
}
