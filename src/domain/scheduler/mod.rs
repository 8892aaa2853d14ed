pub mod allocation;
pub mod config;
pub mod node;
pub mod node_pool;
pub mod policy;
pub mod task;
pub mod workload_manager;
