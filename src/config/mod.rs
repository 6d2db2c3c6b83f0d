//! Configuration module for the browse worker
//!
//! This module provides the `WorkerConfig` struct, its builder and an
//! environment loader with validation and sensible defaults.

pub mod builder;
pub mod getters;
pub mod types;

pub use builder::WorkerConfigBuilder;
pub use types::{ConfigError, WorkerConfig};
pub(crate) use builder::is_identifier;
