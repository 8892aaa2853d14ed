use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to write statistics: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Task for job {job} has a negative cost ({cost})")]
    InvalidCost { job: String, cost: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown node category: {0}")]
    UnknownNodeCategory(String),

    #[error("Unknown bookkeeping mode: {0}")]
    UnknownBookkeepingMode(String),

    #[error("Node {0} is not part of the world")]
    NodeNotFound(String),

    #[error("Target {0} is not part of the world")]
    TargetNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
