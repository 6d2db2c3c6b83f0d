//! Job data model
//!
//! A [`Job`] is built fresh for every attempt from the fields the tracker hands
//! over and is never mutated afterwards. Bucket identifiers are derived from
//! `(job_id, tries)` so two retries of the same logical job never share proxy
//! state.

pub mod result;

use serde::{Deserialize, Serialize};

use crate::warcprox::WarcproxMeta;

pub use result::{CaptureResult, CustomJsOutcome, CustomJsStatus, PartialCapture};

/// Fields supplied by the tracker for one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Opaque job document as the tracker knows it
    pub full_job: serde_json::Value,
    /// Tracker job id
    pub id: String,
    /// Attempt number of this job (1 for the first try)
    pub tries: u32,
    /// Target URL
    pub url: String,
    /// Partition key for this attempt's records
    pub warc_prefix: String,
    /// Do not append the attribution suffix to the user agent
    #[serde(default)]
    pub stealth_ua: bool,
    /// Caller-supplied extraction script
    #[serde(default)]
    pub custom_js: Option<String>,
    /// Caller info page embedded in the attribution suffix
    pub info_url: String,
}

/// One attempt of one job
#[derive(Debug, Clone)]
pub struct Job {
    pub full_job: serde_json::Value,
    pub id: String,
    pub tries: u32,
    pub url: String,
    pub warc_prefix: String,
    pub dedup_bucket: String,
    pub stats_bucket: String,
    pub stealth_ua: bool,
    pub custom_js: Option<String>,
    pub cookie_jar: Option<Vec<u8>>,
    pub info_url: String,
}

/// Dedup bucket for an attempt
///
/// Per-attempt dedup is disabled: every attempt writes into the shared
/// unnamed bucket. The signature keeps the `(job_id, tries)` dependency so
/// enabling `dedup-{id}-{tries}` is a one-line change.
#[must_use]
pub fn dedup_bucket(_job_id: &str, _tries: u32) -> String {
    String::new()
}

/// Stats bucket for an attempt
#[must_use]
pub fn stats_bucket(job_id: &str, tries: u32) -> String {
    format!("stats-{job_id}-{tries}")
}

impl Job {
    #[must_use]
    pub fn from_descriptor(descriptor: JobDescriptor) -> Self {
        let dedup_bucket = dedup_bucket(&descriptor.id, descriptor.tries);
        let stats_bucket = stats_bucket(&descriptor.id, descriptor.tries);
        Self {
            full_job: descriptor.full_job,
            id: descriptor.id,
            tries: descriptor.tries,
            url: descriptor.url,
            warc_prefix: descriptor.warc_prefix,
            dedup_bucket,
            stats_bucket,
            stealth_ua: descriptor.stealth_ua,
            custom_js: descriptor.custom_js,
            cookie_jar: None,
            info_url: descriptor.info_url,
        }
    }

    /// Routing directive for every request and record of this attempt
    #[must_use]
    pub fn warcprox_meta(&self) -> WarcproxMeta {
        WarcproxMeta::new(&self.warc_prefix)
            .with_dedup_bucket(&self.dedup_bucket, crate::warcprox::BucketMode::ReadWrite)
            .with_stats_bucket(&self.stats_bucket)
    }

    /// Whether the caller asked for an extraction script
    #[must_use]
    pub fn wants_custom_js(&self) -> bool {
        self.custom_js.as_deref().is_some_and(|js| !js.is_empty())
    }
}
