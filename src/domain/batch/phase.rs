use std::fmt;

use crate::domain::utils::id::TargetId;

/// The three kinds of work a batch combines against one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseKind {
    /// Lowers the side-effect metric.
    Corrective,
    /// Restores the target resource, raising the side-effect metric.
    Replenishment,
    /// Depletes the target resource, raising the side-effect metric slightly.
    Extraction,
}

impl PhaseKind {
    /// Finishing order of the phases within one wave.
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Corrective, PhaseKind::Replenishment, PhaseKind::Extraction];
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::Corrective => "Corrective",
            PhaseKind::Replenishment => "Replenishment",
            PhaseKind::Extraction => "Extraction",
        };
        write!(f, "{}", name)
    }
}

/// Timing and power of one phase, relative to the moment the batch is dispatched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePlan {
    pub kind: PhaseKind,
    pub wave: u32,
    pub power: i64,
    pub duration: f64,
    pub delay: f64,
}

impl PhasePlan {
    pub fn finish_time(&self) -> f64 {
        self.delay + self.duration
    }
}

/// Start delays of one wave so that its phases finish Corrective, Replenishment, Extraction,
/// each at least `gap` after the previous one. The corrective phase always starts at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseDelays {
    pub corrective: f64,
    pub replenishment: f64,
    pub extraction: f64,
}

impl PhaseDelays {
    pub fn of(&self, kind: PhaseKind) -> f64 {
        match kind {
            PhaseKind::Corrective => self.corrective,
            PhaseKind::Replenishment => self.replenishment,
            PhaseKind::Extraction => self.extraction,
        }
    }
}

/// Computes the delays from the phase durations. Negative durations count as zero.
pub fn phase_delays(corrective: f64, replenishment: f64, extraction: f64, gap: f64) -> PhaseDelays {
    let corrective = corrective.max(0.0);
    let replenishment = replenishment.max(0.0);
    let extraction = extraction.max(0.0);
    let gap = gap.max(0.0);

    let corrective_finish = corrective;
    let replenishment_delay = (corrective_finish + gap - replenishment).max(0.0);
    let replenishment_finish = replenishment_delay + replenishment;
    let extraction_delay = (replenishment_finish + gap - extraction).max(0.0);

    PhaseDelays { corrective: 0.0, replenishment: replenishment_delay, extraction: extraction_delay }
}

/// Everything the generator decided for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub target: TargetId,
    pub preparation: bool,
    /// Phases in dispatch order, wave after wave.
    pub phases: Vec<PhasePlan>,
}

impl BatchPlan {
    /// The phase of `kind` in the first wave.
    pub fn phase(&self, kind: PhaseKind) -> Option<&PhasePlan> {
        self.phases.iter().find(|phase| phase.kind == kind && phase.wave == 0)
    }

    pub fn finish_time(&self, kind: PhaseKind) -> Option<f64> {
        self.phase(kind).map(PhasePlan::finish_time)
    }

    /// Time from dispatch until the last phase of the last wave finishes.
    pub fn span(&self) -> f64 {
        self.phases.iter().map(PhasePlan::finish_time).fold(0.0, f64::max)
    }

    pub fn total_power(&self) -> i64 {
        self.phases.iter().map(|phase| phase.power).sum()
    }
}
