//! Port traits (interfaces) for external dependencies.

pub mod config_port;
pub mod document_store_port;
pub mod results_port;
