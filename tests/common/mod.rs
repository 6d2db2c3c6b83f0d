//! Test doubles shared by the integration tests

use anyhow::Result;
use mnbot_worker::capture::ScriptFetcher;
use mnbot_worker::runner::ResultStore;
use mnbot_worker::session::{BrowseHooks, BrowseOutcome, BrowseRequest, BrowserSession, CommandId};
use mnbot_worker::warcprox::{RecordTransport, RecordWriter, WriteRecordRequest};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

#[allow(dead_code)]
pub const HEADLESS_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) HeadlessChrome/120.0.0.0 Safari/537.36";

#[allow(dead_code)]
pub const RENDERED_HTML: &str = "<html><head></head><body><a href=\"/a\">a</a></body></html>";

/// Observable state of a [`FakeSession`]
#[derive(Debug, Default)]
pub struct FakeState {
    pub running: bool,
    pub starts: Vec<(String, Option<Vec<u8>>)>,
    pub stops: usize,
    pub next_id: CommandId,
    /// Added to the id `send` reports, to simulate an engine that skips ids
    pub id_skew: CommandId,
    pub expected: HashSet<CommandId>,
    pub received: HashMap<CommandId, Value>,
    /// Replies not yet delivered; they arrive on the next poll
    pub in_flight: HashMap<CommandId, Value>,
    pub sent: Vec<(CommandId, String, Value)>,
    /// Method → `result` payload of its reply
    pub replies: HashMap<String, Value>,
    /// Methods whose command is accepted but never answered
    pub silent: HashSet<String>,
    pub final_url: String,
    pub status: Option<u16>,
    /// Outlinks `browse_page` reports (must stay empty when suppressed)
    pub navigation_outlinks: Vec<String>,
    pub outlinks: Vec<String>,
    pub screenshot: Option<Vec<u8>>,
    pub service_worker_events: Vec<Value>,
    pub browse_requests: Vec<BrowseRequest>,
    pub hashtag_visits: Vec<(String, Vec<String>)>,
    /// Stop running as soon as a command is sent
    pub crash_on_send: bool,
}

/// Scriptable in-memory browser session
#[derive(Debug, Clone)]
pub struct FakeSession {
    pub state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeSession {
    pub fn new() -> Self {
        let mut replies = HashMap::new();
        replies.insert("Browser.getVersion".to_string(), json!({"userAgent": HEADLESS_UA}));
        replies.insert("DOM.getDocument".to_string(), json!({"root": {"nodeId": 1}}));
        replies.insert("DOM.getOuterHTML".to_string(), json!({"outerHTML": RENDERED_HTML}));
        replies.insert(
            "Runtime.evaluate".to_string(),
            json!({"result": {"type": "number", "value": 2, "description": "2"}}),
        );

        let state = FakeState {
            next_id: 1,
            replies,
            final_url: "https://example.com/final".to_string(),
            status: Some(200),
            outlinks: vec![
                "https://example.com/a".to_string(),
                "https://example.com/final#section".to_string(),
            ],
            screenshot: Some(b"\xff\xd8full-jpeg".to_vec()),
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with(self, configure: impl FnOnce(&mut FakeState)) -> Self {
        configure(&mut *self.state.lock());
        self
    }

    pub fn sent_methods(&self) -> Vec<String> {
        self.state.lock().sent.iter().map(|(_, m, _)| m.clone()).collect()
    }
}

impl BrowserSession for FakeSession {
    fn start(&mut self, proxy: &str, cookie_db: Option<&[u8]>) -> Result<()> {
        let mut state = self.state.lock();
        if state.running {
            anyhow::bail!("already running");
        }
        state.running = true;
        state.starts.push((proxy.to_string(), cookie_db.map(<[u8]>::to_vec)));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.running {
            state.running = false;
            state.stops += 1;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn next_command_id(&self) -> CommandId {
        let state = self.state.lock();
        state.next_id
    }

    fn register_expectation(&self, id: CommandId) {
        self.state.lock().expected.insert(id);
    }

    fn unregister_expectation(&self, id: CommandId) {
        self.state.lock().expected.remove(&id);
    }

    fn send(&self, method: &str, params: Value) -> Result<CommandId> {
        let mut state = self.state.lock();
        if !state.running {
            anyhow::bail!("session not running");
        }
        let id = state.next_id + state.id_skew;
        state.next_id = id + 1;
        state.sent.push((id, method.to_string(), params));

        if state.crash_on_send {
            state.running = false;
            return Ok(id);
        }
        if state.silent.contains(method) {
            return Ok(id);
        }
        let reply = match state.replies.get(method) {
            Some(result) => json!({"id": id, "result": result}),
            None => json!({"id": id, "error": {"code": -32601, "message": "method not found"}}),
        };
        state.in_flight.insert(id, reply);
        Ok(id)
    }

    fn has_result(&self, id: CommandId) -> bool {
        let mut state = self.state.lock();
        let arrived: Vec<CommandId> = state.in_flight.keys().copied().collect();
        for reply_id in arrived {
            if let Some(reply) = state.in_flight.remove(&reply_id)
                && state.expected.remove(&reply_id)
            {
                state.received.insert(reply_id, reply);
            }
        }
        state.received.contains_key(&id)
    }

    fn pop_result(&self, id: CommandId) -> Option<Value> {
        self.state.lock().received.remove(&id)
    }

    fn browse_page(
        &mut self,
        request: &BrowseRequest,
        hooks: &mut BrowseHooks<'_>,
    ) -> Result<BrowseOutcome> {
        let (events, screenshot, outcome) = {
            let mut state = self.state.lock();
            state.browse_requests.push(request.clone());
            (
                state.service_worker_events.clone(),
                state.screenshot.clone(),
                BrowseOutcome {
                    final_url: state.final_url.clone(),
                    outlinks: state.navigation_outlinks.clone(),
                },
            )
        };

        for event in &events {
            (hooks.on_service_worker_version_updated)(event);
        }
        if let Some(screenshot) = screenshot {
            (hooks.on_screenshot)(&screenshot)?;
        }
        Ok(outcome)
    }

    fn page_status(&self) -> Option<u16> {
        self.state.lock().status
    }

    fn extract_outlinks(&mut self) -> Result<Vec<String>> {
        Ok(self.state.lock().outlinks.clone())
    }

    fn visit_hashtags(&mut self, page_url: &str, outlinks: &[String]) -> Result<()> {
        self.state
            .lock()
            .hashtag_visits
            .push((page_url.to_string(), outlinks.to_vec()));
        Ok(())
    }

    fn thumbnail(full_jpeg: &[u8]) -> Result<Vec<u8>> {
        Ok(format!("thumbnail of {} bytes", full_jpeg.len()).into_bytes())
    }
}

/// One record write as captured by [`RecordingTransport`]
#[derive(Debug, Clone)]
pub struct WrittenRecord {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

#[allow(dead_code)]
impl WrittenRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.payload).unwrap()
    }
}

/// In-memory proxy: records every write and answers with a fixed status
#[derive(Debug)]
pub struct RecordingTransport {
    pub records: Mutex<Vec<WrittenRecord>>,
    /// Status for writes whose URL starts with the prefix; 204 otherwise
    pub reject: Option<(String, u16)>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            reject: None,
        })
    }

    pub fn rejecting(prefix: &str, status: u16) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            reject: Some((prefix.to_string(), status)),
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn record(&self, url: &str) -> Option<WrittenRecord> {
        self.records.lock().iter().find(|r| r.url == url).cloned()
    }

    pub fn writer(self: &Arc<Self>) -> RecordWriter {
        RecordWriter::with_transport("warcprox:8000", self.clone())
    }
}

impl RecordTransport for RecordingTransport {
    fn send(&self, request: &WriteRecordRequest<'_>, _timeout: Duration) -> std::io::Result<u16> {
        self.records.lock().push(WrittenRecord {
            url: request.url.to_string(),
            headers: request
                .headers
                .iter()
                .map(|(n, v)| ((*n).to_string(), v.clone()))
                .collect(),
            payload: request.payload.to_vec(),
        });
        match &self.reject {
            Some((prefix, status)) if request.url.starts_with(prefix.as_str()) => Ok(*status),
            _ => Ok(204),
        }
    }
}

/// Tracker that keeps every stored field in order
#[derive(Debug, Default)]
pub struct RecordingTracker {
    pub stored: Mutex<Vec<(String, String, u32, Value)>>,
}

#[allow(dead_code)]
impl RecordingTracker {
    pub fn fields(&self) -> Vec<String> {
        self.stored.lock().iter().map(|(_, f, _, _)| f.clone()).collect()
    }

    pub fn value(&self, field: &str) -> Option<Value> {
        self.stored
            .lock()
            .iter()
            .find(|(_, f, _, _)| f == field)
            .map(|(_, _, _, v)| v.clone())
    }
}

impl ResultStore for RecordingTracker {
    async fn store_result(&self, job_id: &str, field: &str, attempt: u32, value: Value) -> Result<()> {
        self.stored
            .lock()
            .push((job_id.to_string(), field.to_string(), attempt, value));
        Ok(())
    }
}

/// Script fetcher that only records what it was asked to fetch
#[derive(Debug, Default)]
pub struct RecordingFetcher {
    pub fetched: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptFetcher for RecordingFetcher {
    fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<u16> {
        self.fetched.lock().push((url.to_string(), headers.to_vec()));
        Ok(200)
    }
}

/// Raw request received by [`spawn_fake_proxy`]
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Single-connection TCP proxy answering every request with `status`
///
/// Returns its address and a handle yielding the request it received.
#[allow(dead_code)]
pub fn spawn_fake_proxy(status: u16) -> (String, std::thread::JoinHandle<RawRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').unwrap();
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let length: usize = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.parse().unwrap())
            .unwrap_or(0);
        let mut body = vec![0; length];
        reader.read_exact(&mut body).unwrap();

        let mut stream = stream;
        write!(stream, "HTTP/1.1 {status} Whatever\r\nContent-Length: 0\r\n\r\n").unwrap();
        stream.flush().unwrap();

        RawRequest {
            request_line: request_line.trim_end().to_string(),
            headers,
            body,
        }
    });

    (addr, handle)
}
