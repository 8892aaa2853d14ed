use crate::api::config_dto::{BatchConfigDto, PhaseJobsDto};
use crate::domain::batch::phase::PhaseKind;
use crate::domain::utils::id::JobId;
use crate::error::Error;

/// Tuning of the batch generator.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Share of the target resource one batch extracts.
    pub extraction_fraction: f64,
    /// Minimum time between two consecutive phase finishes.
    pub gap: f64,
    /// Offset between two waves of the same batch.
    pub spacing: f64,
    pub waves: u32,
    pub corrective_margin: f64,
    pub replenishment_margin: f64,
    /// Side-effect added per unit of replenishment power.
    pub replenishment_increment: f64,
    /// Side-effect added per unit of extraction power.
    pub extraction_increment: f64,
    /// Substitute for zero or near-zero effect readings.
    pub power_floor: f64,
    /// Substitute for an empty target resource.
    pub state_floor: f64,
    pub extraction_forbids_privileged: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            extraction_fraction: 0.2,
            gap: 50.0,
            spacing: 150.0,
            waves: 1,
            corrective_margin: 1.1,
            replenishment_margin: 1.05,
            replenishment_increment: 0.004,
            extraction_increment: 0.002,
            power_floor: 0.1,
            state_floor: 0.001,
            extraction_forbids_privileged: true,
        }
    }
}

impl TryFrom<BatchConfigDto> for BatchConfig {
    type Error = Error;

    fn try_from(dto: BatchConfigDto) -> Result<Self, Self::Error> {
        if !(dto.extraction_fraction > 0.0 && dto.extraction_fraction < 1.0) {
            return Err(Error::InvalidConfiguration(format!("extractionFraction must be in (0, 1), got {}", dto.extraction_fraction)));
        }

        if dto.gap < 0.0 || dto.spacing < 0.0 {
            return Err(Error::InvalidConfiguration(format!("gap and spacing must not be negative, got {} and {}", dto.gap, dto.spacing)));
        }

        if dto.waves == 0 {
            return Err(Error::InvalidConfiguration("waves must be at least 1".to_string()));
        }

        if dto.power_floor <= 0.0 || !(dto.state_floor > 0.0 && dto.state_floor < 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "powerFloor must be positive and stateFloor in (0, 1), got {} and {}",
                dto.power_floor, dto.state_floor
            )));
        }

        if dto.corrective_margin < 1.0 || dto.replenishment_margin < 1.0 {
            log::warn!("Safety margins below 1.0 let batches under-correct.");
        }

        Ok(BatchConfig {
            extraction_fraction: dto.extraction_fraction,
            gap: dto.gap,
            spacing: dto.spacing,
            waves: dto.waves,
            corrective_margin: dto.corrective_margin,
            replenishment_margin: dto.replenishment_margin,
            replenishment_increment: dto.replenishment_increment,
            extraction_increment: dto.extraction_increment,
            power_floor: dto.power_floor,
            state_floor: dto.state_floor,
            extraction_forbids_privileged: dto.extraction_forbids_privileged,
        })
    }
}

/// Job run for each phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseJobs {
    pub corrective: JobId,
    pub replenishment: JobId,
    pub extraction: JobId,
}

impl PhaseJobs {
    pub fn job(&self, kind: PhaseKind) -> &JobId {
        match kind {
            PhaseKind::Corrective => &self.corrective,
            PhaseKind::Replenishment => &self.replenishment,
            PhaseKind::Extraction => &self.extraction,
        }
    }
}

impl Default for PhaseJobs {
    fn default() -> Self {
        PhaseJobs::from(PhaseJobsDto::default())
    }
}

impl From<PhaseJobsDto> for PhaseJobs {
    fn from(dto: PhaseJobsDto) -> Self {
        PhaseJobs { corrective: JobId::new(dto.corrective), replenishment: JobId::new(dto.replenishment), extraction: JobId::new(dto.extraction) }
    }
}
