//! Best-effort capture of service-worker scripts
//!
//! Service-worker scripts fetched by the browser do not reliably end up in the
//! attempt's archive output, so each distinct script URL is fetched once more
//! directly through the proxy. Failures are logged and swallowed.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches a URL through the archiving proxy
pub trait ScriptFetcher: Send + Sync {
    /// Fetch `url` with `headers`; returns the response status
    fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<u16>;
}

/// Fetcher backed by a blocking HTTP client proxied through the archiving proxy
///
/// The client is built on first use, which always happens on a worker thread.
#[derive(Debug)]
pub struct ProxiedFetcher {
    proxy_url: String,
    timeout: Duration,
    client: Mutex<Option<reqwest::blocking::Client>>,
}

impl ProxiedFetcher {
    #[must_use]
    pub fn new(proxy_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            timeout,
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<reqwest::blocking::Client> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::blocking::Client::builder()
            .proxy(reqwest::Proxy::all(&self.proxy_url).context("Invalid proxy URL")?)
            // The proxy re-signs TLS with its own CA
            .danger_accept_invalid_certs(true)
            .timeout(self.timeout)
            .build()
            .context("Failed to build proxied HTTP client")?;
        *slot = Some(client.clone());
        Ok(client)
    }
}

impl ScriptFetcher for ProxiedFetcher {
    fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<u16> {
        debug!(url, "fetching through proxy");
        let mut request = self.client()?.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().with_context(|| format!("Failed to fetch {url}"))?;
        let status = response.status().as_u16();
        // Drain the body so the proxy records the complete response
        response.bytes().with_context(|| format!("Failed to read body of {url}"))?;
        Ok(status)
    }
}

/// Script URL referenced by a `ServiceWorker.workerVersionUpdated` message
#[must_use]
pub fn script_url(message: &Value) -> Option<&str> {
    message
        .get("params")?
        .get("versions")?
        .get(0)?
        .get("scriptURL")?
        .as_str()
        .filter(|url| !url.is_empty())
}

/// Per-attempt service-worker capture state
///
/// Owns the set of already fetched script URLs; built fresh for every attempt
/// and dropped with it.
pub struct ServiceWorkerCapture<'a> {
    fetcher: &'a dyn ScriptFetcher,
    headers: &'a [(String, String)],
    fetched: HashSet<String>,
}

impl<'a> ServiceWorkerCapture<'a> {
    #[must_use]
    pub fn new(fetcher: &'a dyn ScriptFetcher, headers: &'a [(String, String)]) -> Self {
        Self {
            fetcher,
            headers,
            fetched: HashSet::new(),
        }
    }

    /// Handle one service-worker-update event
    pub fn on_version_updated(&mut self, message: &Value) {
        let Some(url) = script_url(message) else {
            return;
        };
        if self.fetched.contains(url) {
            return;
        }

        info!(url, "fetching service worker script");
        match self.fetcher.fetch(url, self.headers) {
            Ok(status) => debug!(url, status, "fetched service worker script"),
            Err(e) => warn!(url, "failed to proxy URL; stifling issue: {e:#}"),
        }
        self.fetched.insert(url.to_string());
    }

    /// Script URLs handled so far
    #[must_use]
    pub fn fetched(&self) -> &HashSet<String> {
        &self.fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FlakyFetcher {
        calls: Mutex<Vec<String>>,
    }

    impl ScriptFetcher for FlakyFetcher {
        fn fetch(&self, url: &str, _headers: &[(String, String)]) -> Result<u16> {
            self.calls.lock().push(url.to_string());
            anyhow::bail!("connection refused")
        }
    }

    fn event(url: &str) -> Value {
        json!({"method": "ServiceWorker.workerVersionUpdated",
               "params": {"versions": [{"scriptURL": url}]}})
    }

    #[test]
    fn fetches_each_script_once_and_swallows_errors() {
        let fetcher = FlakyFetcher {
            calls: Mutex::new(Vec::new()),
        };
        let headers = Vec::new();
        let mut capture = ServiceWorkerCapture::new(&fetcher, &headers);

        capture.on_version_updated(&event("https://example.com/sw.js"));
        capture.on_version_updated(&event("https://example.com/sw.js"));
        capture.on_version_updated(&event("https://example.com/other-sw.js"));
        capture.on_version_updated(&json!({"params": {"versions": []}}));

        assert_eq!(
            *fetcher.calls.lock(),
            vec![
                "https://example.com/sw.js".to_string(),
                "https://example.com/other-sw.js".to_string()
            ]
        );
        assert_eq!(capture.fetched().len(), 2);
    }
}
