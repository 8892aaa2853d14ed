pub mod overseer;
