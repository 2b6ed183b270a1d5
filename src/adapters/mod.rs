//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod json_results_adapter;
pub mod sqlite_store_adapter;
