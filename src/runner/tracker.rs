//! Result reporting to the job tracker

use anyhow::Result;
use serde_json::Value;
use std::future::Future;
use tracing::info;

/// Result field names as the tracker knows them
pub const FIELD_STATUS_CODE: &str = "status_code";
pub const FIELD_OUTLINKS: &str = "outlinks";
pub const FIELD_FINAL_URL: &str = "final_url";
pub const FIELD_CUSTOM_JS: &str = "custom_js";

/// Durable per-field result storage
///
/// A returned `Ok` means the field is durably stored.
pub trait ResultStore: Send + Sync + 'static {
    fn store_result(
        &self,
        job_id: &str,
        field: &str,
        attempt: u32,
        value: Value,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Store that reports every field to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResultStore;

impl ResultStore for LogResultStore {
    async fn store_result(&self, job_id: &str, field: &str, attempt: u32, value: Value) -> Result<()> {
        info!(job_id, field, attempt, %value, "result field");
        Ok(())
    }
}
