//! Page capture: the per-attempt state machine and its stages

pub mod custom_js;
pub mod errors;
pub mod orchestrator;
pub mod service_worker;

pub use custom_js::classify_reply;
pub use errors::CaptureError;
pub use orchestrator::{CaptureContext, CaptureFailure, CaptureStage, PageCapture};
pub use service_worker::{ProxiedFetcher, ScriptFetcher, ServiceWorkerCapture};
