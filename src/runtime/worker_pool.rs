//! Bounded pool of worker threads for blocking browser work
//!
//! The scheduler never runs the automation engine itself. It submits a closure
//! and gets back a [`BlockingTask`] that resolves once a worker thread has run
//! it. At most `size` closures run at once; the rest wait for a permit without
//! occupying a thread.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker thread panicked: {0}")]
    Panicked(String),

    #[error("Worker task was cancelled")]
    Cancelled,

    #[error("Worker pool is closed")]
    Closed,
}

/// A pending blocking job; resolves with the closure's return value
pub struct BlockingTask<T> {
    receiver: oneshot::Receiver<Result<T, WorkerError>>,
}

impl<T> BlockingTask<T> {
    #[must_use]
    pub fn new(receiver: oneshot::Receiver<Result<T, WorkerError>>) -> Self {
        Self { receiver }
    }
}

impl<T> Future for BlockingTask<T> {
    type Output = Result<T, WorkerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(WorkerError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Threads currently free
    #[must_use]
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `f` on a worker thread once one is free
    ///
    /// Must be called from within the runtime. The permit is held by the
    /// worker thread itself, so dropping the returned task does not free a
    /// slot while the closure is still running.
    pub fn spawn<F, T>(&self, f: F) -> BlockingTask<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                let _ = tx.send(Err(WorkerError::Closed));
                return;
            };
            debug!("dispatching blocking job to worker thread");

            let joined = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                f()
            })
            .await;

            let result = joined.map_err(|e| {
                if e.is_panic() {
                    let message = panic_message(e.into_panic());
                    error!("worker thread panicked: {message}");
                    WorkerError::Panicked(message)
                } else {
                    WorkerError::Cancelled
                }
            });
            let _ = tx.send(result);
        });

        BlockingTask::new(rx)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn returns_closure_value() {
        let pool = WorkerPool::new(2);
        let value = pool.spawn(|| 40 + 2).await;
        assert_eq!(value, Ok(42));
    }

    #[tokio::test]
    async fn panics_become_errors() {
        let pool = WorkerPool::new(1);
        let result = pool.spawn(|| -> u32 { panic!("engine exploded") }).await;
        assert_eq!(result, Err(WorkerError::Panicked("engine exploded".to_string())));

        // The slot is released again
        assert_eq!(pool.spawn(|| 1).await, Ok(1));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrency_is_bounded_by_pool_size() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                pool.spawn(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.expect("worker finished");
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.idle(), 2);
    }
}
