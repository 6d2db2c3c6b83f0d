//! Fixed-size browser session pool with scoped acquisition
//!
//! `acquire()` blocks the calling worker thread until a session is free. The
//! returned guard owns the session exclusively; dropping it (on success, error
//! or panic unwinding) stops the session and hands it back to the pool.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::BrowserSession;

#[derive(Debug)]
pub struct SessionPool<S> {
    available: Mutex<VecDeque<S>>,
    returned: Condvar,
    size: usize,
    leases: AtomicU64,
}

impl<S: BrowserSession> SessionPool<S> {
    #[must_use]
    pub fn new(sessions: Vec<S>) -> Arc<Self> {
        let size = sessions.len();
        Arc::new(Self {
            available: Mutex::new(sessions.into()),
            returned: Condvar::new(),
            size,
            leases: AtomicU64::new(0),
        })
    }

    /// Total number of sessions owned by the pool
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sessions currently free
    #[must_use]
    pub fn available(&self) -> usize {
        self.available.lock().len()
    }

    /// Block until a session is free and lease it
    pub fn acquire(self: &Arc<Self>) -> SessionGuard<S> {
        let mut available = self.available.lock();
        loop {
            if let Some(session) = available.pop_front() {
                let lease = self.leases.fetch_add(1, Ordering::Relaxed);
                debug!(lease, "Acquired browser session");
                return SessionGuard {
                    session: Some(session),
                    pool: Arc::clone(self),
                    lease,
                };
            }
            debug!(size = self.size, "All browser sessions leased, waiting");
            self.returned.wait(&mut available);
        }
    }

    fn release(&self, session: S) {
        self.available.lock().push_back(session);
        self.returned.notify_one();
    }
}

/// Exclusive lease of one session
pub struct SessionGuard<S: BrowserSession> {
    session: Option<S>,
    pool: Arc<SessionPool<S>>,
    lease: u64,
}

impl<S: BrowserSession> SessionGuard<S> {
    /// Lease number, for log correlation
    #[must_use]
    pub fn lease(&self) -> u64 {
        self.lease
    }
}

impl<S: BrowserSession> std::ops::Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session.as_ref().expect("session is present until drop")
    }
}

impl<S: BrowserSession> std::ops::DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().expect("session is present until drop")
    }
}

impl<S: BrowserSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.stop() {
                warn!(lease = self.lease, "Failed to stop browser session: {e:#}");
            }
            self.pool.release(session);
            debug!(lease = self.lease, "Released browser session back to pool");
        }
    }
}
