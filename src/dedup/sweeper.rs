//! Dedup retention sweeper
//!
//! Housekeeping only: a failed sweep is logged and forgotten, the next run
//! simply covers the same range again. Stats buckets are left alone; the proxy
//! maintains them on its own.

use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::errors::DedupError;
use super::store::{DedupStore, Durability};

#[derive(Debug)]
pub struct DedupSweeper<D: DedupStore> {
    store: Arc<D>,
    retention: Duration,
}

impl<D: DedupStore> DedupSweeper<D> {
    #[must_use]
    pub fn new(store: Arc<D>, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Delete entries older than the retention window
    ///
    /// Returns the number of entries queued for deletion, or `None` if the
    /// sweep failed. Never raises.
    pub async fn sweep(&self) -> Option<u64> {
        match self.try_sweep().await {
            Ok(deleted) => {
                info!(deleted, "queued old dedup entries for deletion");
                Some(deleted)
            }
            Err(e) => {
                error!("dedup sweep failed: {e}");
                None
            }
        }
    }

    async fn try_sweep(&self) -> Result<u64, DedupError> {
        let retention = TimeDelta::from_std(self.retention)
            .map_err(|_| DedupError::InvalidRetention(self.retention))?;
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .ok_or(DedupError::InvalidRetention(self.retention))?;
        self.store.delete_older_than(cutoff, Durability::Soft).await
    }

    /// Sweep every `interval`, starting immediately
    pub fn start_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                self.sweep().await;
            }
        })
    }
}
