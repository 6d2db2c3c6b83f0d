//! Attempt runner
//!
//! The scheduler-facing entry point: runs one capture on the bounded worker
//! pool, stores whatever result fields it produced, then decides whether the
//! attempt succeeded.

pub mod errors;
pub mod tracker;

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bridge::RemoteControlBridge;
use crate::capture::{CaptureContext, PageCapture, ProxiedFetcher, ScriptFetcher};
use crate::config::WorkerConfig;
use crate::job::{CustomJsStatus, Job, JobDescriptor, PartialCapture};
use crate::runtime::WorkerPool;
use crate::session::{BrowserSession, SessionPool};
use crate::warcprox::RecordWriter;

pub use errors::AttemptError;
pub use tracker::{
    FIELD_CUSTOM_JS, FIELD_FINAL_URL, FIELD_OUTLINKS, FIELD_STATUS_CODE, LogResultStore,
    ResultStore,
};

/// Collaborators every capture runs with
#[derive(Clone)]
struct CaptureSettings {
    bridge: RemoteControlBridge,
    writer: RecordWriter,
    fetcher: Arc<dyn ScriptFetcher>,
    proxy_url: String,
}

impl CaptureSettings {
    fn context(&self) -> CaptureContext<'_> {
        CaptureContext {
            bridge: &self.bridge,
            writer: &self.writer,
            fetcher: self.fetcher.as_ref(),
            proxy_url: &self.proxy_url,
        }
    }
}

pub struct AttemptRunner<S: BrowserSession, T: ResultStore> {
    sessions: Arc<SessionPool<S>>,
    workers: WorkerPool,
    tracker: T,
    settings: Arc<CaptureSettings>,
}

impl<S: BrowserSession + 'static, T: ResultStore> AttemptRunner<S, T> {
    #[must_use]
    pub fn new(config: &WorkerConfig, sessions: Arc<SessionPool<S>>, tracker: T) -> Self {
        let proxy_url = config.proxy_url();
        Self {
            sessions,
            workers: WorkerPool::new(config.worker_threads()),
            tracker,
            settings: Arc::new(CaptureSettings {
                bridge: RemoteControlBridge::new(
                    config.command_timeout(),
                    config.bridge_poll_interval(),
                ),
                writer: RecordWriter::new(config.proxy_addr()).timeout(config.write_timeout()),
                fetcher: Arc::new(ProxiedFetcher::new(proxy_url.clone(), config.write_timeout())),
                proxy_url,
            }),
        }
    }

    /// Replace the record writer
    #[must_use]
    pub fn with_writer(mut self, writer: RecordWriter) -> Self {
        self.settings_mut().writer = writer;
        self
    }

    /// Replace the service-worker script fetcher
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        self.settings_mut().fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_bridge(mut self, bridge: RemoteControlBridge) -> Self {
        self.settings_mut().bridge = bridge;
        self
    }

    fn settings_mut(&mut self) -> &mut CaptureSettings {
        Arc::make_mut(&mut self.settings)
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Run one attempt of one job
    ///
    /// Returns the attempt's `(dedup_bucket, stats_bucket)` on success. Every
    /// result field obtained is stored before any failure is returned.
    pub async fn run_attempt(
        &self,
        descriptor: JobDescriptor,
    ) -> Result<(String, String), AttemptError> {
        let job = Job::from_descriptor(descriptor);
        info!(job_id = %job.id, tries = job.tries, url = %job.url, "starting attempt");

        let sessions = Arc::clone(&self.sessions);
        let settings = Arc::clone(&self.settings);
        let worker_job = job.clone();
        let outcome = self
            .workers
            .spawn(move || {
                let mut session = sessions.acquire();
                let capture = PageCapture::new(&mut *session, settings.context(), &worker_job);
                capture.run()
            })
            .await?;

        let (partial, failure) = match outcome {
            Ok(result) => (PartialCapture::from(result), None),
            Err(failure) => (failure.partial, Some(failure.error)),
        };

        self.store_fields(&job, &partial).await?;

        if let Some(error) = failure {
            warn!(job_id = %job.id, "attempt failed: {error}");
            return Err(AttemptError::Capture(error));
        }

        let status = partial.status_code.unwrap_or_default();
        if status >= 400 {
            warn!(job_id = %job.id, status, "rejecting attempt");
            return Err(AttemptError::BadStatus(status));
        }
        if job.wants_custom_js() {
            let status = partial
                .custom_js_result
                .as_ref()
                .map_or(CustomJsStatus::Unknown, |outcome| outcome.status());
            if status != CustomJsStatus::Success {
                warn!(job_id = %job.id, %status, "rejecting attempt");
                return Err(AttemptError::CustomJs(status));
            }
        }

        info!(job_id = %job.id, stats_bucket = %job.stats_bucket, "attempt succeeded");
        Ok((job.dedup_bucket, job.stats_bucket))
    }

    /// Store each obtained field individually, in a fixed order
    async fn store_fields(&self, job: &Job, partial: &PartialCapture) -> Result<(), AttemptError> {
        let mut fields: Vec<(&str, Value)> = Vec::with_capacity(4);
        if let Some(status) = partial.status_code {
            fields.push((FIELD_STATUS_CODE, json!(status)));
        }
        if let Some(outlinks) = &partial.outlinks {
            fields.push((FIELD_OUTLINKS, json!(outlinks)));
        }
        if let Some(final_url) = &partial.final_url {
            fields.push((FIELD_FINAL_URL, json!(final_url)));
        }
        if job.wants_custom_js()
            && let Some(outcome) = &partial.custom_js_result
        {
            let value =
                serde_json::to_value(outcome).map_err(|e| AttemptError::Tracker(e.into()))?;
            fields.push((FIELD_CUSTOM_JS, value));
        }

        for (field, value) in fields {
            self.tracker
                .store_result(&job.id, field, job.tries, value)
                .await
                .map_err(AttemptError::Tracker)?;
        }
        Ok(())
    }
}
