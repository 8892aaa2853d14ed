pub mod config_dto;
pub mod world_dto;
