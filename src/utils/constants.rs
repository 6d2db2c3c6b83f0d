//! Shared constants for the browse worker
//!
//! Default values and protocol constants used throughout the codebase to keep
//! timeouts, header names and logical record URLs consistent.

use std::time::Duration;

/// Tool name embedded in the user agent suffix and metadata records
pub const TOOL_NAME: &str = "mnbot";

/// Crate version, written into every job metadata record
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default address of the archiving proxy (host:port, no scheme)
pub const DEFAULT_PROXY_ADDR: &str = "warcprox:8000";

/// Default page that the user agent suffix points at
pub const DEFAULT_INFO_URL: &str = "https://wiki.archiveteam.org/index.php/Mnbot";

/// Reserved request method the proxy interprets as "write this payload as a record"
pub const WRITE_RECORD_METHOD: &str = "WARCPROX_WRITE_RECORD";

/// The only status the proxy answers with once a record is durably queued
pub const WRITE_RECORD_ACCEPTED: u16 = 204;

/// Header carrying the JSON routing directive understood by the proxy
pub const WARCPROX_META_HEADER: &str = "Warcprox-Meta";

/// Remote-control command timeout
///
/// Applies to every bridge call. A slow or hung command only stalls the
/// attempt that issued it.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Record write timeout
///
/// Full-page screenshots of long pages can be tens of megabytes, so writes
/// get a much longer window than commands.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(600);

/// How often the bridge re-checks for a correlated reply
pub const BRIDGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Dedup index entries older than this are pruned by the sweeper
pub const DEDUP_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Default interval between two sweeps
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Fixed backoff between two proxy health probes
pub const HEALTH_CHECK_BACKOFF: Duration = Duration::from_secs(5);

/// Health probes attempted before the initialization barrier gives up (10 minutes at 5s)
pub const HEALTH_CHECK_MAX_ATTEMPTS: u32 = 120;

/// Thumbnail width in pixels; height follows the screenshot aspect ratio
pub const THUMBNAIL_WIDTH: u32 = 300;

/// JPEG quality for screenshots and thumbnails
pub const JPEG_QUALITY: u8 = 95;

/// Replies whose debug representation is at least this long are elided from logs
pub const MAX_LOGGED_REPLY_LEN: usize = 1024;

/// Logical URL of the job metadata record written before navigation
pub const JOB_METADATA_URL: &str = "metadata:mnbot-job-metadata";

/// Logical URL of the result record written at the end of an attempt
pub const JOB_RESULT_URL: &str = "metadata:mnbot-job-result";

/// Logical URL prefixes for auxiliary capture records
pub const SCREENSHOT_PREFIX: &str = "screenshot:";
pub const THUMBNAIL_PREFIX: &str = "thumbnail:";
pub const RENDERED_DOM_PREFIX: &str = "rendered-dom:";
