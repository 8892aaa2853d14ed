pub mod dispatch;
pub mod oracle;
pub mod simulated_world;
pub mod topology;
