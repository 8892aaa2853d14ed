pub mod id;
pub mod profiler;
pub mod statistics;
