//! Core configuration type for the browse worker
//!
//! `WorkerConfig` is built once at startup (see [`super::builder`]) and shared
//! read-only by the runner, the orchestrator and the sweeper.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration error raised by the builder or the environment loader
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is out of its accepted range
    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// An environment variable is set but cannot be parsed
    #[error("Environment variable {var} has unparsable value '{value}'")]
    Unparsable { var: String, value: String },
}

/// Main configuration struct for the worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Archiving proxy address as `host:port`
    pub(crate) proxy_addr: String,

    /// Number of browser sessions in the pool
    ///
    /// A job waits for a free session when every session is leased.
    pub(crate) browsers: usize,

    /// Size of the bounded worker-thread pool running orchestrations
    pub(crate) worker_threads: usize,

    /// Remote-control command timeout
    pub(crate) command_timeout: Duration,

    /// Record write timeout
    pub(crate) write_timeout: Duration,

    /// Poll interval of the bridge while waiting for a reply
    pub(crate) bridge_poll_interval: Duration,

    /// Dedup entries older than this are swept
    pub(crate) dedup_retention: Duration,

    /// Interval between two periodic sweeps
    pub(crate) sweep_interval: Duration,

    /// Document database holding the proxy's dedup index
    pub(crate) database_url: String,

    /// Name of the dedup index table
    pub(crate) dedup_table: String,

    /// Fixed backoff between proxy health probes
    pub(crate) health_check_backoff: Duration,

    /// Probes attempted before the initialization barrier fails
    pub(crate) health_check_max_attempts: u32,

    /// Explicit Chromium executable; auto-detected when `None`
    pub(crate) chrome_path: Option<PathBuf>,

    /// Run sessions headless
    pub(crate) headless: bool,

    /// Page embedded in the attribution suffix of the user agent
    pub(crate) info_url: String,
}
