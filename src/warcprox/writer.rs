//! Record writer
//!
//! Writes an arbitrary payload as an auxiliary record through the archiving
//! proxy. A write either ends with the proxy's accepted status or fails the
//! whole attempt; there is no partial-write recovery.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::meta::WarcproxMeta;
use super::transport::{RecordTransport, TcpRecordTransport, WriteRecordRequest};
use crate::capture::CaptureError;
use crate::utils::{WARCPROX_META_HEADER, WRITE_RECORD_ACCEPTED, WRITE_TIMEOUT};

#[derive(Clone)]
pub struct RecordWriter {
    transport: Arc<dyn RecordTransport>,
    proxy_addr: String,
    timeout: Duration,
}

impl std::fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("proxy_addr", &self.proxy_addr)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RecordWriter {
    /// Writer talking to the proxy at `proxy_addr` over TCP
    #[must_use]
    pub fn new(proxy_addr: impl Into<String>) -> Self {
        let proxy_addr = proxy_addr.into();
        Self {
            transport: Arc::new(TcpRecordTransport::new(proxy_addr.clone())),
            proxy_addr,
            timeout: WRITE_TIMEOUT,
        }
    }

    /// Writer over a custom transport
    #[must_use]
    pub fn with_transport(proxy_addr: impl Into<String>, transport: Arc<dyn RecordTransport>) -> Self {
        Self {
            transport,
            proxy_addr: proxy_addr.into(),
            timeout: WRITE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Write `payload` as a resource record named `url`
    pub fn write_record(
        &self,
        url: &str,
        content_type: &str,
        payload: &[u8],
        meta: &WarcproxMeta,
    ) -> Result<(), CaptureError> {
        debug!(url, content_type, bytes = payload.len(), "writing record to WARC");

        let request = WriteRecordRequest {
            url,
            headers: vec![
                ("Content-Type", content_type.to_string()),
                ("WARC-Type", "resource".to_string()),
                ("Host", self.proxy_addr.clone()),
                (WARCPROX_META_HEADER, meta.to_header_value()?),
            ],
            payload,
        };

        let status = self.transport.send(&request, self.timeout)?;
        if status != WRITE_RECORD_ACCEPTED {
            return Err(CaptureError::Protocol {
                url: url.to_string(),
                status,
            });
        }
        Ok(())
    }
}
