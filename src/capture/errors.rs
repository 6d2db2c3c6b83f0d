//! Error taxonomy of one browse attempt
//!
//! Every variant is fatal to the attempt. Best-effort failures (service-worker
//! script fetches) never become a `CaptureError`; they are logged where they
//! happen.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The proxy did not answer a record write with its accepted status
    #[error("Bad status code {status} from warcprox writing {url}")]
    Protocol { url: String, status: u16 },

    /// No correlated reply within the command window
    #[error("Timed out after {timeout:?} waiting for reply to {method}")]
    Timeout { method: String, timeout: Duration },

    /// The automation engine broke its contract with the orchestrator
    #[error("Automation engine contract violation: {0}")]
    ContractViolation(String),

    /// A reply arrived but lacks the fields the command guarantees
    #[error("Malformed reply to {method}: {detail}")]
    MalformedReply { method: String, detail: String },

    /// The browser went away while a command was outstanding
    #[error("Browser session closed while waiting for {method}")]
    SessionClosed { method: String },

    /// Network failure talking to the proxy
    #[error("Proxy transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Failure inside the automation engine
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

impl CaptureError {
    /// Recover a typed error that travelled through the engine as `anyhow::Error`
    ///
    /// Callbacks run inside the engine (the screenshot writer) report their
    /// `CaptureError` through it; unwrap it again so the kind is preserved.
    #[must_use]
    pub fn from_engine(error: anyhow::Error) -> Self {
        match error.downcast::<CaptureError>() {
            Ok(typed) => typed,
            Err(other) => Self::Browser(other),
        }
    }
}
