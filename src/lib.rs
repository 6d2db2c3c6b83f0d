pub mod bridge;
pub mod browser_profile;
pub mod browser_setup;
pub mod capture;
pub mod chromium;
pub mod config;
pub mod dedup;
pub mod init;
pub mod job;
pub mod runner;
pub mod runtime;
pub mod session;
pub mod utils;
pub mod warcprox;

pub use bridge::RemoteControlBridge;
pub use capture::{CaptureError, CaptureFailure, CaptureStage, PageCapture};
pub use chromium::ChromiumSession;
pub use config::{ConfigError, WorkerConfig};
pub use dedup::{DedupError, DedupStore, DedupSweeper, SqliteDedupStore};
pub use init::{InitError, initialize, wait_for_proxy};
pub use job::{CaptureResult, CustomJsOutcome, CustomJsStatus, Job, JobDescriptor};
pub use runner::{AttemptError, AttemptRunner, LogResultStore, ResultStore};
pub use runtime::{WorkerError, WorkerPool};
pub use session::{BrowserSession, SessionGuard, SessionPool};
pub use warcprox::{RecordWriter, WarcproxMeta};
