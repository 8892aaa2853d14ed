use serde::{Deserialize, Serialize};

/// Description of a whole simulated fleet: the nodes reachable from `root`, the job catalogue
/// and the targets batches are generated for.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldDto {
    pub root: String,
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub jobs: Vec<JobDto>,
    #[serde(default)]
    pub targets: Vec<TargetDto>,
    /// Relative jitter applied to every duration reading, e.g. `0.05` for +-5%.
    #[serde(default)]
    pub duration_jitter: f64,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDto {
    pub name: String,
    pub max_capacity: f64,
    #[serde(default)]
    pub used_capacity: f64,
    #[serde(default = "default_cores")]
    pub cores: i64,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_admin_access")]
    pub admin_access: bool,
    #[serde(default)]
    pub neighbours: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDto {
    pub id: String,
    pub cost: f64,
    /// How long one launch runs once started. Jobs without a runtime keep their memory until
    /// the world is reset.
    #[serde(default)]
    pub runtime_ms: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDto {
    pub id: String,
    pub resource_ratio: f64,
    pub corrective: PhaseReadingDto,
    pub replenishment: PhaseReadingDto,
    pub extraction: PhaseReadingDto,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReadingDto {
    pub effect_per_power: f64,
    pub duration: f64,
}

impl JobDto {
    pub fn new(id: &str, cost: f64) -> Self {
        JobDto { id: id.to_string(), cost, runtime_ms: None }
    }
}

impl NodeDto {
    /// An admin-accessible single-core node without neighbours.
    pub fn new(name: &str, max_capacity: f64) -> Self {
        NodeDto {
            name: name.to_string(),
            max_capacity,
            used_capacity: 0.0,
            cores: default_cores(),
            categories: Vec::new(),
            admin_access: default_admin_access(),
            neighbours: Vec::new(),
        }
    }
}

fn default_cores() -> i64 {
    1
}

fn default_admin_access() -> bool {
    true
}
