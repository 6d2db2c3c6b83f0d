//! Chromium-backed browser session
//!
//! chromiumoxide is async; the session contract is blocking. Every blocking
//! method drives the async calls to completion through the runtime handle, so
//! it must only run on a worker thread. Remote-control commands are the
//! exception: `send` spawns the call on the runtime and returns immediately,
//! and the reply lands in the session's reply table.

mod js_scripts;
mod raw_command;
pub mod thumbnail;

use anyhow::{Context, Result, anyhow};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventResponseReceived, Headers, ResourceType, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, FrameId,
};
use chromiumoxide::cdp::browser_protocol::service_worker::{
    self, EventWorkerVersionUpdated,
};
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use self::js_scripts::{OUTLINKS_SCRIPT, STEALTH_SCRIPT, set_hash_script};
use self::raw_command::RawCdpCommand;
use crate::browser_profile::{BrowserProfile, create_unique_profile};
use crate::browser_setup::{LaunchOptions, launch_browser};
use crate::config::WorkerConfig;
use crate::session::{BrowseHooks, BrowseOutcome, BrowseRequest, BrowserSession, CommandId};
use crate::utils::{JPEG_QUALITY, is_valid_url, same_page_anchors};

/// How long a same-page anchor visit is given to run page handlers
const HASHTAG_SETTLE: Duration = Duration::from_millis(500);

/// Replies kept for registered command ids
#[derive(Debug, Default)]
struct ReplyTable {
    expected: HashSet<CommandId>,
    received: HashMap<CommandId, Value>,
}

impl ReplyTable {
    fn deliver(&mut self, id: CommandId, message: Value) {
        if self.expected.remove(&id) {
            self.received.insert(id, message);
        } else {
            log::trace!("Discarding reply to unregistered command {id}");
        }
    }

    fn clear(&mut self) {
        self.expected.clear();
        self.received.clear();
    }
}

struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    listeners: Vec<JoinHandle<()>>,
    service_worker_events: mpsc::UnboundedReceiver<Value>,
    // Dropped last: removes the profile directory once the browser is gone
    _profile: BrowserProfile,
}

pub struct ChromiumSession {
    handle: Handle,
    chrome_path: Option<PathBuf>,
    headless: bool,
    command_timeout: Duration,
    running: Option<Running>,
    replies: Arc<Mutex<ReplyTable>>,
    next_id: AtomicU64,
    page_status: Arc<Mutex<Option<u16>>>,
}

impl std::fmt::Debug for ChromiumSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumSession")
            .field("chrome_path", &self.chrome_path)
            .field("headless", &self.headless)
            .field("running", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

impl ChromiumSession {
    /// New stopped session; `handle` is the runtime its async calls run on
    #[must_use]
    pub fn new(handle: Handle, config: &WorkerConfig) -> Self {
        Self {
            handle,
            chrome_path: config.chrome_path().map(PathBuf::from),
            headless: config.headless(),
            command_timeout: config.command_timeout(),
            running: None,
            replies: Arc::new(Mutex::new(ReplyTable::default())),
            next_id: AtomicU64::new(1),
            page_status: Arc::new(Mutex::new(None)),
        }
    }

    fn running(&self) -> Result<&Running> {
        self.running
            .as_ref()
            .ok_or_else(|| anyhow!("Browser session is not running"))
    }

    fn page(&self) -> Result<Page> {
        Ok(self.running()?.page.clone())
    }

    /// Hand pending service-worker events to the hook
    fn drain_service_worker_events(&mut self, hooks: &mut BrowseHooks<'_>) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        while let Ok(message) = running.service_worker_events.try_recv() {
            (hooks.on_service_worker_version_updated)(&message);
        }
    }
}

/// Record the status of every main-frame document response
async fn spawn_status_listener(
    page: &Page,
    main_frame: Option<FrameId>,
    status: Arc<Mutex<Option<u16>>>,
) -> Result<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventResponseReceived>()
        .await
        .context("Failed to subscribe to Network.responseReceived")?;

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if event.r#type != ResourceType::Document {
                continue;
            }
            if main_frame.is_some() && event.frame_id != main_frame {
                continue;
            }
            *status.lock() = u16::try_from(event.response.status).ok();
        }
    }))
}

/// Forward service-worker version updates as raw protocol messages
async fn spawn_service_worker_listener(
    page: &Page,
    sink: mpsc::UnboundedSender<Value>,
) -> Result<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventWorkerVersionUpdated>()
        .await
        .context("Failed to subscribe to ServiceWorker.workerVersionUpdated")?;

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let params = match serde_json::to_value(&*event) {
                Ok(params) => params,
                Err(e) => {
                    log::warn!("Could not serialize service worker event: {e}");
                    continue;
                }
            };
            let message = json!({
                "method": "ServiceWorker.workerVersionUpdated",
                "params": params,
            });
            if sink.send(message).is_err() {
                break;
            }
        }
    }))
}

async fn collect_outlinks(page: &Page) -> Result<Vec<String>> {
    let links: Vec<String> = page
        .evaluate(OUTLINKS_SCRIPT)
        .await
        .context("Failed to execute outlink extraction script")?
        .into_value()
        .context("Failed to parse outlinks from JS result")?;
    Ok(links.into_iter().filter(|link| is_valid_url(link)).collect())
}

async fn visit_anchors(page: &Page, page_url: &str, outlinks: &[String]) -> Result<()> {
    for anchor in same_page_anchors(page_url, outlinks) {
        let Some(fragment) = url::Url::parse(&anchor)
            .ok()
            .and_then(|u| u.fragment().map(str::to_string))
        else {
            continue;
        };
        log::debug!("Visiting hashtag {anchor}");
        page.evaluate(set_hash_script(&fragment))
            .await
            .with_context(|| format!("Failed to visit {anchor}"))?;
        tokio::time::sleep(HASHTAG_SETTLE).await;
    }
    Ok(())
}

impl BrowserSession for ChromiumSession {
    fn start(&mut self, proxy: &str, cookie_db: Option<&[u8]>) -> Result<()> {
        if self.running.is_some() {
            return Err(anyhow!("Browser session is already running"));
        }

        let profile = create_unique_profile()?;
        if let Some(cookie_db) = cookie_db {
            profile.install_cookie_db(cookie_db)?;
        }

        let handle = self.handle.clone();
        let page_status = Arc::clone(&self.page_status);
        let options = LaunchOptions {
            chrome_path: self.chrome_path.as_deref(),
            headless: self.headless,
            user_data_dir: profile.path(),
            proxy_url: proxy,
            request_timeout: self.command_timeout,
        };

        let (browser, handler, page, listeners, service_worker_events) = handle.block_on(async {
            let (browser, handler) = launch_browser(options).await?;
            let page = browser
                .new_page("about:blank")
                .await
                .context("Failed to open page")?;
            page.execute(network::EnableParams::default())
                .await
                .context("Failed to enable Network domain")?;

            let main_frame = page.mainframe().await?;
            let (sink, service_worker_events) = mpsc::unbounded_channel();
            let listeners = vec![
                spawn_status_listener(&page, main_frame, page_status).await?,
                spawn_service_worker_listener(&page, sink).await?,
            ];
            anyhow::Ok((browser, handler, page, listeners, service_worker_events))
        })?;

        log::info!("Started browser session against {proxy}");
        self.running = Some(Running {
            browser,
            handler,
            page,
            listeners,
            service_worker_events,
            _profile: profile,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };

        for listener in &running.listeners {
            listener.abort();
        }
        let closed = self.handle.block_on(async {
            running
                .browser
                .close()
                .await
                .context("Failed to close browser")?;
            if let Err(e) = running.browser.wait().await {
                log::warn!("Failed to reap browser process: {e}");
            }
            anyhow::Ok(())
        });
        running.handler.abort();

        self.replies.lock().clear();
        *self.page_status.lock() = None;
        log::info!("Stopped browser session");
        closed
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handler.is_finished())
    }

    fn next_command_id(&self) -> CommandId {
        self.next_id.load(Ordering::SeqCst)
    }

    fn register_expectation(&self, id: CommandId) {
        self.replies.lock().expected.insert(id);
    }

    fn unregister_expectation(&self, id: CommandId) {
        self.replies.lock().expected.remove(&id);
    }

    fn send(&self, method: &str, params: Value) -> Result<CommandId> {
        let page = self.page()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let replies = Arc::clone(&self.replies);
        let command = RawCdpCommand::new(method, params);

        self.handle.spawn(async move {
            let message = match page.execute(command).await {
                Ok(response) => json!({ "id": id, "result": response.result }),
                Err(e) => json!({ "id": id, "error": { "message": e.to_string() } }),
            };
            replies.lock().deliver(id, message);
        });
        Ok(id)
    }

    fn has_result(&self, id: CommandId) -> bool {
        self.replies.lock().received.contains_key(&id)
    }

    fn pop_result(&self, id: CommandId) -> Option<Value> {
        self.replies.lock().received.remove(&id)
    }

    fn browse_page(
        &mut self,
        request: &BrowseRequest,
        hooks: &mut BrowseHooks<'_>,
    ) -> Result<BrowseOutcome> {
        let page = self.page()?;
        *self.page_status.lock() = None;

        let final_url = self.handle.block_on(async {
            page.set_user_agent(request.user_agent.clone())
                .await
                .context("Failed to override user agent")?;

            let headers: serde_json::Map<String, Value> = request
                .extra_headers
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(Value::Object(headers))))
                .await
                .context("Failed to set extra request headers")?;

            if request.stealth {
                page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
                    .await
                    .context("Failed to inject stealth script")?;
            }

            page.execute(service_worker::EnableParams::default())
                .await
                .context("Failed to enable ServiceWorker domain")?;

            log::info!("Navigating to {}", request.page_url);
            page.goto(request.page_url.as_str())
                .await
                .with_context(|| format!("Failed to navigate to {}", request.page_url))?;

            let final_url = page.url().await?.unwrap_or_else(|| request.page_url.clone());
            anyhow::Ok(final_url)
        })?;
        self.drain_service_worker_events(hooks);

        let screenshot = self.handle.block_on(async {
            page.screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Jpeg)
                    .quality(i64::from(JPEG_QUALITY))
                    .full_page(true)
                    .build(),
            )
            .await
            .context("Failed to capture screenshot")
        })?;
        (hooks.on_screenshot)(&screenshot)?;
        self.drain_service_worker_events(hooks);

        let outlinks = if request.skip_extract_outlinks {
            Vec::new()
        } else {
            self.handle.block_on(collect_outlinks(&page))?
        };
        if !request.skip_visit_hashtags {
            self.handle
                .block_on(visit_anchors(&page, &final_url, &outlinks))?;
        }

        Ok(BrowseOutcome {
            final_url,
            outlinks,
        })
    }

    fn page_status(&self) -> Option<u16> {
        *self.page_status.lock()
    }

    fn extract_outlinks(&mut self) -> Result<Vec<String>> {
        let page = self.page()?;
        self.handle.block_on(collect_outlinks(&page))
    }

    fn visit_hashtags(&mut self, page_url: &str, outlinks: &[String]) -> Result<()> {
        let page = self.page()?;
        self.handle
            .block_on(visit_anchors(&page, page_url, outlinks))
    }

    fn thumbnail(full_jpeg: &[u8]) -> Result<Vec<u8>> {
        thumbnail::thumbnail_jpeg(full_jpeg)
    }
}
