//! Remote-control bridge
//!
//! Issues a command on an attached browser session and blocks the calling
//! worker thread until the correlated reply arrives or the window elapses.
//! Runs on the attempt's own worker thread, so a hung command stalls only that
//! attempt.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::capture::CaptureError;
use crate::session::BrowserSession;
use crate::utils::{BRIDGE_POLL_INTERVAL, COMMAND_TIMEOUT, MAX_LOGGED_REPLY_LEN};

#[derive(Debug, Clone, Copy)]
pub struct RemoteControlBridge {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for RemoteControlBridge {
    fn default() -> Self {
        Self::new(COMMAND_TIMEOUT, BRIDGE_POLL_INTERVAL)
    }
}

impl RemoteControlBridge {
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `method` with the bridge's default timeout and wait for its reply
    pub fn call<S: BrowserSession + ?Sized>(
        &self,
        session: &S,
        method: &str,
        params: Value,
    ) -> Result<Value, CaptureError> {
        self.send_and_wait(session, method, params, self.timeout)
    }

    /// Send `method` and block until the reply correlated to it arrives
    ///
    /// The returned message is the full reply, `{"id": .., "result": {..}}`.
    pub fn send_and_wait<S: BrowserSession + ?Sized>(
        &self,
        session: &S,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, CaptureError> {
        debug!(method, "running remote-control command");

        let expected = session.next_command_id();
        session.register_expectation(expected);
        let id = match session.send(method, params) {
            Ok(id) => id,
            Err(e) => {
                session.unregister_expectation(expected);
                return Err(CaptureError::from_engine(e));
            }
        };
        if id != expected {
            warn!(method, expected, id, "session assigned an unexpected command id");
            session.unregister_expectation(expected);
            session.register_expectation(id);
        }

        debug!(method, id, "waiting for response");
        let deadline = Instant::now() + timeout;
        while !session.has_result(id) {
            if !session.is_running() {
                return Err(CaptureError::SessionClosed {
                    method: method.to_string(),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CaptureError::Timeout {
                    method: method.to_string(),
                    timeout,
                });
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }

        let message = session.pop_result(id).ok_or_else(|| CaptureError::MalformedReply {
            method: method.to_string(),
            detail: format!("reply {id} vanished before it could be taken"),
        })?;

        let repr = format!("{message:?}");
        if repr.len() < MAX_LOGGED_REPLY_LEN {
            debug!(method, id, "received response: {repr}");
        } else {
            debug!(method, id, "received response (too long for logs)");
        }
        Ok(message)
    }
}
