//! Getter methods for `WorkerConfig`

use std::path::Path;
use std::time::Duration;

use super::types::WorkerConfig;

impl WorkerConfig {
    #[must_use]
    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }

    /// Proxy URL handed to the browser (`http://host:port`)
    #[must_use]
    pub fn proxy_url(&self) -> String {
        format!("http://{}", self.proxy_addr)
    }

    #[must_use]
    pub fn browsers(&self) -> usize {
        self.browsers
    }

    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    #[must_use]
    pub fn bridge_poll_interval(&self) -> Duration {
        self.bridge_poll_interval
    }

    #[must_use]
    pub fn dedup_retention(&self) -> Duration {
        self.dedup_retention
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    #[must_use]
    pub fn dedup_table(&self) -> &str {
        &self.dedup_table
    }

    #[must_use]
    pub fn health_check_backoff(&self) -> Duration {
        self.health_check_backoff
    }

    #[must_use]
    pub fn health_check_max_attempts(&self) -> u32 {
        self.health_check_max_attempts
    }

    #[must_use]
    pub fn chrome_path(&self) -> Option<&Path> {
        self.chrome_path.as_deref()
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn info_url(&self) -> &str {
        &self.info_url
    }
}
