//! Browser session capabilities required from the automation engine
//!
//! The engine blocks its calling thread, so every method here is synchronous
//! and is only ever called from a worker thread, never from the cooperative
//! scheduler. The remote-control surface (`next_command_id`,
//! `register_expectation`, `send`, `has_result`, `pop_result`) is part of the
//! contract so the bridge never has to reach into engine internals.

pub mod pool;

use anyhow::Result;
use serde_json::Value;

pub use pool::{SessionGuard, SessionPool};

/// Correlation id of a remote-control command
pub type CommandId = u64;

/// Navigation request handed to the engine
#[derive(Debug, Clone, Default)]
pub struct BrowseRequest {
    pub page_url: String,
    pub user_agent: String,
    /// Extra request headers (routing directive) for every page request
    pub extra_headers: Vec<(String, String)>,
    /// Do not extract outlinks during navigation
    pub skip_extract_outlinks: bool,
    /// Do not visit same-page anchors during navigation
    pub skip_visit_hashtags: bool,
    /// Apply the engine's stealth measures
    pub stealth: bool,
}

/// What navigation reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseOutcome {
    pub final_url: String,
    pub outlinks: Vec<String>,
}

/// Screenshot callback; an error aborts navigation and is returned from `browse_page`
pub type ScreenshotHook<'a> = dyn FnMut(&[u8]) -> Result<()> + 'a;

/// Service-worker-update callback, receives the raw event message
pub type ServiceWorkerHook<'a> = dyn FnMut(&Value) + 'a;

/// Callbacks invoked by the engine during navigation
pub struct BrowseHooks<'a> {
    pub on_screenshot: Box<ScreenshotHook<'a>>,
    pub on_service_worker_version_updated: Box<ServiceWorkerHook<'a>>,
}

impl Default for BrowseHooks<'_> {
    fn default() -> Self {
        Self {
            on_screenshot: Box::new(|_| Ok(())),
            on_service_worker_version_updated: Box::new(|_| {}),
        }
    }
}

/// One browser session of the automation engine
pub trait BrowserSession: Send {
    /// Start the browser against `proxy`, optionally pre-loaded with a cookie store
    fn start(&mut self, proxy: &str, cookie_db: Option<&[u8]>) -> Result<()>;

    /// Stop the browser; a stopped session may be started again
    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Id the next `send` will use
    fn next_command_id(&self) -> CommandId;

    /// Keep the reply for `id` once it arrives
    ///
    /// Replies to ids nobody registered are discarded. Registering before
    /// sending closes the window in which a fast reply could be dropped.
    fn register_expectation(&self, id: CommandId);

    /// Stop keeping the reply for `id`
    fn unregister_expectation(&self, id: CommandId);

    /// Send a remote-control command and return its correlation id
    fn send(&self, method: &str, params: Value) -> Result<CommandId>;

    /// Whether the reply for `id` has arrived
    fn has_result(&self, id: CommandId) -> bool;

    /// Take the reply for `id`
    fn pop_result(&self, id: CommandId) -> Option<Value>;

    /// Navigate to the page and run the engine's page behavior
    fn browse_page(
        &mut self,
        request: &BrowseRequest,
        hooks: &mut BrowseHooks<'_>,
    ) -> Result<BrowseOutcome>;

    /// Response status of the last top-level navigation
    fn page_status(&self) -> Option<u16>;

    fn extract_outlinks(&mut self) -> Result<Vec<String>>;

    /// Visit the same-page anchors of `page_url` found in `outlinks`
    fn visit_hashtags(&mut self, page_url: &str, outlinks: &[String]) -> Result<()>;

    /// Derive a thumbnail from a full-resolution JPEG
    ///
    /// Needs no session state, so callbacks running during `browse_page` can
    /// use it while the session itself is borrowed.
    fn thumbnail(full_jpeg: &[u8]) -> Result<Vec<u8>>
    where
        Self: Sized;
}
