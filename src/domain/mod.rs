//! Core domain types and logic.

pub mod event;
pub mod aggregate;
pub mod ranking;
pub mod describe;
pub mod filter;
pub mod analysis;
pub mod seed;
pub mod classifier;
pub mod config_validation;
pub mod error;
