use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDto {
    pub scheduler: SchedulerConfigDto,
    pub batch: BatchConfigDto,
    pub jobs: PhaseJobsDto,
    pub simulator: SimulatorDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfigDto {
    pub root_node: String,
    pub assign_timeout_ms: i64,
    /// `Optimistic` or `Strict`
    pub bookkeeping: String,
    pub privileged_reserve_fraction: f64,
    pub tick_interval_ms: u64,
    pub target_cooldown_ms: i64,
    pub refresh_every_ticks: u64,
}

impl Default for SchedulerConfigDto {
    fn default() -> Self {
        SchedulerConfigDto {
            root_node: "home".to_string(),
            assign_timeout_ms: 2000,
            bookkeeping: "Optimistic".to_string(),
            privileged_reserve_fraction: 0.2,
            tick_interval_ms: 1,
            target_cooldown_ms: 333,
            refresh_every_ticks: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfigDto {
    pub extraction_fraction: f64,
    pub gap: f64,
    pub spacing: f64,
    pub waves: u32,
    pub corrective_margin: f64,
    pub replenishment_margin: f64,
    pub replenishment_increment: f64,
    pub extraction_increment: f64,
    pub power_floor: f64,
    pub state_floor: f64,
    pub extraction_forbids_privileged: bool,
}

impl Default for BatchConfigDto {
    fn default() -> Self {
        BatchConfigDto {
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

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhaseJobsDto {
    pub corrective: String,
    pub replenishment: String,
    pub extraction: String,
}

impl Default for PhaseJobsDto {
    fn default() -> Self {
        PhaseJobsDto { corrective: "weaken.js".to_string(), replenishment: "grow.js".to_string(), extraction: "hack.js".to_string() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatorDto {
    pub is_simulation: bool,
    pub start_time_ms: i64,
}
