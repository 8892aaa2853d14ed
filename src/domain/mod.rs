pub mod batch;
pub mod driver;
pub mod scheduler;
pub mod simulator;
pub mod utils;
pub mod world;
