pub mod config;
pub mod metadata;
pub mod platform;
pub mod protocol;
pub mod stations;
