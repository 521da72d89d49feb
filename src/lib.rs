pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod loader;
pub mod models;
pub mod tracing_config;
pub mod utils;
pub mod validation;
