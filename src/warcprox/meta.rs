//! Routing directive understood by the archiving proxy
//!
//! Serialized as JSON into the `Warcprox-Meta` header of every proxied request
//! and every written record:
//!
//! ```json
//! {"warc-prefix": "...", "dedup-buckets": {"bucket": "rw"}, "stats": {"buckets": ["..."]}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Access mode of one dedup bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketMode {
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "ro")]
    ReadOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDirective {
    pub buckets: Vec<String>,
}

impl StatsDirective {
    fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarcproxMeta {
    #[serde(rename = "warc-prefix")]
    pub warc_prefix: String,
    #[serde(
        rename = "dedup-buckets",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dedup_buckets: BTreeMap<String, BucketMode>,
    #[serde(default, skip_serializing_if = "StatsDirective::is_empty")]
    pub stats: StatsDirective,
}

impl WarcproxMeta {
    #[must_use]
    pub fn new(warc_prefix: impl Into<String>) -> Self {
        Self {
            warc_prefix: warc_prefix.into(),
            dedup_buckets: BTreeMap::new(),
            stats: StatsDirective::default(),
        }
    }

    #[must_use]
    pub fn with_dedup_bucket(mut self, bucket: impl Into<String>, mode: BucketMode) -> Self {
        self.dedup_buckets.insert(bucket.into(), mode);
        self
    }

    #[must_use]
    pub fn with_stats_bucket(mut self, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        if !self.stats.buckets.contains(&bucket) {
            self.stats.buckets.push(bucket);
        }
        self
    }

    /// Header value form
    pub fn to_header_value(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
