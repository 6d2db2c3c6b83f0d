//! Page capture state machine
//!
//! Drives one attempt through its stages in strict order. Every stage must
//! finish before the next begins; the first fatal error aborts the rest and
//! comes back together with whatever result fields were already obtained.

use serde_json::{Value, json};
use std::cell::Cell;
use std::fmt;
use tracing::{debug, error, info};

use super::custom_js::{EVALUATE_METHOD, classify_reply, evaluate_params};
use super::errors::CaptureError;
use super::service_worker::{ScriptFetcher, ServiceWorkerCapture};
use crate::bridge::RemoteControlBridge;
use crate::job::{CaptureResult, CustomJsOutcome, Job, PartialCapture};
use crate::session::{BrowseHooks, BrowseOutcome, BrowseRequest, BrowserSession};
use crate::utils::{
    JOB_METADATA_URL, JOB_RESULT_URL, RENDERED_DOM_PREFIX, SCREENSHOT_PREFIX, THUMBNAIL_PREFIX,
    VERSION, WARCPROX_META_HEADER, canonicalize_url, rewrite_user_agent,
};
use crate::warcprox::{RecordWriter, WarcproxMeta};

/// Stages of one capture, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Start,
    Identify,
    Announce,
    Navigate,
    Screenshot,
    RunCustomJs,
    ExtractOutlinks,
    DumpDom,
    Finalize,
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Identify => "identify",
            Self::Announce => "announce",
            Self::Navigate => "navigate",
            Self::Screenshot => "screenshot",
            Self::RunCustomJs => "custom-js",
            Self::ExtractOutlinks => "extract-outlinks",
            Self::DumpDom => "dump-dom",
            Self::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// A failed capture: the error, where it happened, and what was obtained before
#[derive(Debug, thiserror::Error)]
#[error("Capture failed during {stage}: {error}")]
pub struct CaptureFailure {
    pub stage: CaptureStage,
    #[source]
    pub error: CaptureError,
    pub partial: PartialCapture,
}

/// Collaborators shared by every stage
#[derive(Clone, Copy)]
pub struct CaptureContext<'a> {
    pub bridge: &'a RemoteControlBridge,
    pub writer: &'a RecordWriter,
    pub fetcher: &'a dyn ScriptFetcher,
    /// Proxy the browser is started against (`http://host:port`)
    pub proxy_url: &'a str,
}

/// One capture of one job on one leased session
pub struct PageCapture<'a, S: BrowserSession> {
    session: &'a mut S,
    ctx: CaptureContext<'a>,
    job: &'a Job,
    meta: WarcproxMeta,
    stage: CaptureStage,
    partial: PartialCapture,
}

impl<'a, S: BrowserSession> PageCapture<'a, S> {
    pub fn new(session: &'a mut S, ctx: CaptureContext<'a>, job: &'a Job) -> Self {
        Self {
            session,
            ctx,
            job,
            meta: job.warcprox_meta(),
            stage: CaptureStage::Start,
            partial: PartialCapture::default(),
        }
    }

    /// Run every stage and return the assembled result
    pub fn run(mut self) -> Result<CaptureResult, CaptureFailure> {
        match self.capture() {
            Ok(result) => {
                info!(job_id = %self.job.id, final_url = %result.final_url, "capture finished");
                Ok(result)
            }
            Err(error) => {
                error!(job_id = %self.job.id, stage = %self.stage, "capture failed: {error}");
                Err(CaptureFailure {
                    stage: self.stage,
                    error,
                    partial: self.partial,
                })
            }
        }
    }

    fn enter(&mut self, stage: CaptureStage) {
        debug!(job_id = %self.job.id, %stage, "entering capture stage");
        self.stage = stage;
    }

    fn capture(&mut self) -> Result<CaptureResult, CaptureError> {
        self.enter(CaptureStage::Start);
        self.session
            .start(self.ctx.proxy_url, self.job.cookie_jar.as_deref())
            .map_err(CaptureError::from_engine)?;

        self.enter(CaptureStage::Identify);
        let user_agent = self.identify()?;

        self.enter(CaptureStage::Announce);
        self.announce()?;

        self.enter(CaptureStage::Navigate);
        let outcome = self.navigate(&user_agent)?;
        let final_url = outcome.final_url;

        let job = self.job;
        let custom_js_result = match job.custom_js.as_deref().filter(|js| !js.is_empty()) {
            Some(script) => {
                self.enter(CaptureStage::RunCustomJs);
                let outcome = self.run_custom_js(script)?;
                self.partial.custom_js_result = Some(outcome.clone());
                Some(outcome)
            }
            None => None,
        };

        self.enter(CaptureStage::ExtractOutlinks);
        let outlinks = self
            .session
            .extract_outlinks()
            .map_err(CaptureError::from_engine)?;
        self.partial.outlinks = Some(outlinks.clone());
        self.session
            .visit_hashtags(&final_url, &outlinks)
            .map_err(CaptureError::from_engine)?;

        self.enter(CaptureStage::DumpDom);
        self.dump_dom(&final_url)?;

        self.enter(CaptureStage::Finalize);
        let result = CaptureResult {
            final_url,
            outlinks,
            custom_js_result,
            status_code: self.partial.status_code.unwrap_or_default(),
        };
        let body = serde_json::to_vec(&json!({ "result": result }))?;
        self.ctx
            .writer
            .write_record(JOB_RESULT_URL, "application/json", &body, &self.meta)?;
        Ok(result)
    }

    /// Reported user agent, rewritten for this job
    fn identify(&mut self) -> Result<String, CaptureError> {
        const METHOD: &str = "Browser.getVersion";
        let reply = self.ctx.bridge.call(&*self.session, METHOD, json!({}))?;
        let reported = reply
            .pointer("/result/userAgent")
            .and_then(Value::as_str)
            .ok_or_else(|| CaptureError::MalformedReply {
                method: METHOD.to_string(),
                detail: "missing result.userAgent".to_string(),
            })?;
        let user_agent = rewrite_user_agent(reported, self.job.stealth_ua, &self.job.info_url);
        debug!(%user_agent, "rewrote user agent");
        Ok(user_agent)
    }

    fn announce(&mut self) -> Result<(), CaptureError> {
        let body = serde_json::to_vec(&json!({
            "job": self.job.full_job,
            "version": VERSION,
        }))?;
        self.ctx
            .writer
            .write_record(JOB_METADATA_URL, "application/json", &body, &self.meta)
    }

    /// Load the page with extraction deferred; screenshots and service-worker
    /// scripts are captured from the engine's callbacks while it runs
    fn navigate(&mut self, user_agent: &str) -> Result<BrowseOutcome, CaptureError> {
        let canon_url = canonicalize_url(&self.job.url);
        let headers = vec![(
            WARCPROX_META_HEADER.to_string(),
            self.meta.to_header_value()?,
        )];
        let request = BrowseRequest {
            page_url: self.job.url.clone(),
            user_agent: user_agent.to_string(),
            extra_headers: headers.clone(),
            skip_extract_outlinks: true,
            skip_visit_hashtags: true,
            // Evasions stay on for every job; `stealth_ua` only drops the attribution suffix
            stealth: true,
        };

        let writer = self.ctx.writer;
        let meta = &self.meta;
        let stage = Cell::new(CaptureStage::Navigate);
        let mut service_workers = ServiceWorkerCapture::new(self.ctx.fetcher, &headers);

        let outcome = {
            let mut hooks = BrowseHooks {
                on_screenshot: Box::new(|full_jpeg: &[u8]| -> anyhow::Result<()> {
                    stage.set(CaptureStage::Screenshot);
                    write_screenshots::<S>(writer, &canon_url, meta, full_jpeg)?;
                    stage.set(CaptureStage::Navigate);
                    Ok(())
                }),
                on_service_worker_version_updated: Box::new(|message: &Value| {
                    service_workers.on_version_updated(message);
                }),
            };
            self.session.browse_page(&request, &mut hooks)
        };
        self.stage = stage.get();
        let outcome = outcome.map_err(CaptureError::from_engine)?;
        self.partial.final_url = Some(outcome.final_url.clone());
        self.partial.status_code = self.session.page_status();

        if !outcome.outlinks.is_empty() {
            return Err(CaptureError::ContractViolation(format!(
                "engine returned {} outlinks with extraction suppressed",
                outcome.outlinks.len()
            )));
        }

        let status = self.partial.status_code.ok_or_else(|| {
            CaptureError::ContractViolation("no status recorded for the top-level response".to_string())
        })?;
        info!(job_id = %self.job.id, status, final_url = %outcome.final_url, "navigation finished");
        Ok(outcome)
    }

    fn run_custom_js(&mut self, script: &str) -> Result<CustomJsOutcome, CaptureError> {
        let reply = self
            .ctx
            .bridge
            .call(&*self.session, EVALUATE_METHOD, evaluate_params(script))?;
        let outcome = classify_reply(&reply);
        info!(job_id = %self.job.id, status = %outcome.status(), "custom script evaluated");
        Ok(outcome)
    }

    fn dump_dom(&mut self, final_url: &str) -> Result<(), CaptureError> {
        const GET_DOCUMENT: &str = "DOM.getDocument";
        const GET_OUTER_HTML: &str = "DOM.getOuterHTML";

        let document = self.ctx.bridge.call(&*self.session, GET_DOCUMENT, json!({}))?;
        let node_id = document
            .pointer("/result/root/nodeId")
            .and_then(Value::as_i64)
            .ok_or_else(|| CaptureError::MalformedReply {
                method: GET_DOCUMENT.to_string(),
                detail: "missing result.root.nodeId".to_string(),
            })?;

        let reply = self
            .ctx
            .bridge
            .call(&*self.session, GET_OUTER_HTML, json!({ "nodeId": node_id }))?;
        let html = reply
            .pointer("/result/outerHTML")
            .and_then(Value::as_str)
            .ok_or_else(|| CaptureError::MalformedReply {
                method: GET_OUTER_HTML.to_string(),
                detail: "missing result.outerHTML".to_string(),
            })?;

        self.ctx.writer.write_record(
            &format!("{RENDERED_DOM_PREFIX}{final_url}"),
            "text/html",
            html.as_bytes(),
            &self.meta,
        )
    }
}

fn write_screenshots<S: BrowserSession>(
    writer: &RecordWriter,
    canon_url: &str,
    meta: &WarcproxMeta,
    full_jpeg: &[u8],
) -> Result<(), CaptureError> {
    let thumbnail = S::thumbnail(full_jpeg).map_err(CaptureError::from_engine)?;
    writer.write_record(
        &format!("{SCREENSHOT_PREFIX}{canon_url}"),
        "image/jpeg",
        full_jpeg,
        meta,
    )?;
    writer.write_record(
        &format!("{THUMBNAIL_PREFIX}{canon_url}"),
        "image/jpeg",
        &thumbnail,
        meta,
    )
}
