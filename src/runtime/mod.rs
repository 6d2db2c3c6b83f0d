//! Bridging the cooperative scheduler and blocking worker threads

pub mod worker_pool;

pub use worker_pool::{BlockingTask, WorkerError, WorkerPool};
