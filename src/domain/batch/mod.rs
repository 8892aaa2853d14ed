pub mod batch_config;
pub mod batch_generator;
pub mod phase;
