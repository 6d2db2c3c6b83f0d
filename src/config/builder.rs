//! Builder and environment loader for `WorkerConfig`
//!
//! Every field has a default from [`crate::utils::constants`]; the builder only
//! validates what was overridden.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::types::{ConfigError, WorkerConfig};
use crate::utils::{
    BRIDGE_POLL_INTERVAL, COMMAND_TIMEOUT, DEDUP_RETENTION, DEFAULT_INFO_URL, DEFAULT_PROXY_ADDR,
    HEALTH_CHECK_BACKOFF, HEALTH_CHECK_MAX_ATTEMPTS, SWEEP_INTERVAL, WRITE_TIMEOUT,
};

const ENV_PREFIX: &str = "MNBOT_";

#[derive(Debug, Clone)]
pub struct WorkerConfigBuilder {
    proxy_addr: String,
    browsers: usize,
    worker_threads: Option<usize>,
    command_timeout: Duration,
    write_timeout: Duration,
    bridge_poll_interval: Duration,
    dedup_retention: Duration,
    sweep_interval: Duration,
    database_url: String,
    dedup_table: String,
    health_check_backoff: Duration,
    health_check_max_attempts: u32,
    chrome_path: Option<PathBuf>,
    headless: bool,
    info_url: String,
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self {
            proxy_addr: DEFAULT_PROXY_ADDR.to_string(),
            browsers: 1,
            worker_threads: None,
            command_timeout: COMMAND_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            bridge_poll_interval: BRIDGE_POLL_INTERVAL,
            dedup_retention: DEDUP_RETENTION,
            sweep_interval: SWEEP_INTERVAL,
            database_url: "sqlite://warcprox-dedup.db".to_string(),
            dedup_table: "dedup".to_string(),
            health_check_backoff: HEALTH_CHECK_BACKOFF,
            health_check_max_attempts: HEALTH_CHECK_MAX_ATTEMPTS,
            chrome_path: None,
            headless: true,
            info_url: DEFAULT_INFO_URL.to_string(),
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Build a configuration from `MNBOT_*` environment variables
    ///
    /// Durations are given in whole seconds except `MNBOT_BRIDGE_POLL_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = WorkerConfigBuilder::default();

        if let Some(v) = env_var("PROXY_ADDR") {
            builder = builder.proxy_addr(v);
        }
        if let Some(v) = env_parse::<usize>("BROWSERS")? {
            builder = builder.browsers(v);
        }
        if let Some(v) = env_parse::<usize>("WORKER_THREADS")? {
            builder = builder.worker_threads(v);
        }
        if let Some(v) = env_parse::<u64>("COMMAND_TIMEOUT_SECS")? {
            builder = builder.command_timeout(Duration::from_secs(v));
        }
        if let Some(v) = env_parse::<u64>("WRITE_TIMEOUT_SECS")? {
            builder = builder.write_timeout(Duration::from_secs(v));
        }
        if let Some(v) = env_parse::<u64>("BRIDGE_POLL_MS")? {
            builder = builder.bridge_poll_interval(Duration::from_millis(v));
        }
        if let Some(v) = env_parse::<u64>("DEDUP_RETENTION_SECS")? {
            builder = builder.dedup_retention(Duration::from_secs(v));
        }
        if let Some(v) = env_parse::<u64>("SWEEP_INTERVAL_SECS")? {
            builder = builder.sweep_interval(Duration::from_secs(v));
        }
        if let Some(v) = env_var("DATABASE_URL") {
            builder = builder.database_url(v);
        }
        if let Some(v) = env_var("DEDUP_TABLE") {
            builder = builder.dedup_table(v);
        }
        if let Some(v) = env_parse::<u64>("HEALTH_CHECK_BACKOFF_SECS")? {
            builder = builder.health_check_backoff(Duration::from_secs(v));
        }
        if let Some(v) = env_parse::<u32>("HEALTH_CHECK_MAX_ATTEMPTS")? {
            builder = builder.health_check_max_attempts(v);
        }
        if let Some(v) = env_var("CHROME_PATH").or_else(|| std::env::var("CHROMIUM_PATH").ok()) {
            builder = builder.chrome_path(PathBuf::from(v));
        }
        if let Some(v) = env_parse::<bool>("HEADLESS")? {
            builder = builder.headless(v);
        }
        if let Some(v) = env_var("INFO_URL") {
            builder = builder.info_url(v);
        }

        builder.build()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Unparsable {
                var: format!("{ENV_PREFIX}{name}"),
                value,
            }),
    }
}

impl WorkerConfigBuilder {
    #[must_use]
    pub fn proxy_addr(mut self, addr: impl Into<String>) -> Self {
        self.proxy_addr = addr.into();
        self
    }

    /// Set the session pool size; the worker pool follows unless set explicitly
    #[must_use]
    pub fn browsers(mut self, browsers: usize) -> Self {
        self.browsers = browsers;
        self
    }

    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn bridge_poll_interval(mut self, interval: Duration) -> Self {
        self.bridge_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn dedup_retention(mut self, retention: Duration) -> Self {
        self.dedup_retention = retention;
        self
    }

    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    #[must_use]
    pub fn dedup_table(mut self, table: impl Into<String>) -> Self {
        self.dedup_table = table.into();
        self
    }

    #[must_use]
    pub fn health_check_backoff(mut self, backoff: Duration) -> Self {
        self.health_check_backoff = backoff;
        self
    }

    #[must_use]
    pub fn health_check_max_attempts(mut self, attempts: u32) -> Self {
        self.health_check_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn info_url(mut self, url: impl Into<String>) -> Self {
        self.info_url = url.into();
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<WorkerConfig, ConfigError> {
        if self.proxy_addr.trim().is_empty() || self.proxy_addr.contains("://") {
            return Err(invalid("proxy_addr", "expected host:port without a scheme"));
        }
        if self.browsers == 0 {
            return Err(invalid("browsers", "at least one browser session is required"));
        }
        let worker_threads = self.worker_threads.unwrap_or(self.browsers);
        if worker_threads == 0 {
            return Err(invalid("worker_threads", "at least one worker thread is required"));
        }
        for (field, value) in [
            ("command_timeout", self.command_timeout),
            ("write_timeout", self.write_timeout),
            ("bridge_poll_interval", self.bridge_poll_interval),
            ("dedup_retention", self.dedup_retention),
            ("sweep_interval", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if !is_identifier(&self.dedup_table) {
            return Err(invalid(
                "dedup_table",
                format!("'{}' is not a plain identifier", self.dedup_table),
            ));
        }
        if self.health_check_max_attempts == 0 {
            return Err(invalid("health_check_max_attempts", "must be at least 1"));
        }

        Ok(WorkerConfig {
            proxy_addr: self.proxy_addr,
            browsers: self.browsers,
            worker_threads,
            command_timeout: self.command_timeout,
            write_timeout: self.write_timeout,
            bridge_poll_interval: self.bridge_poll_interval,
            dedup_retention: self.dedup_retention,
            sweep_interval: self.sweep_interval,
            database_url: self.database_url,
            dedup_table: self.dedup_table,
            health_check_backoff: self.health_check_backoff,
            health_check_max_attempts: self.health_check_max_attempts,
            chrome_path: self.chrome_path,
            headless: self.headless,
            info_url: self.info_url,
        })
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
