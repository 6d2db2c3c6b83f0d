//! User agent rewriting
//!
//! The browser reports a headless Linux identity. Archived traffic should look
//! like a regular desktop browser, consistent with the stealth script the
//! automation engine injects, and (unless stealth is requested) carry a suffix
//! that attributes the traffic to this tool.

use super::constants::{TOOL_NAME, VERSION};

const HEADLESS_MARKER: &str = "HeadlessChrome";
const HEADFUL_MARKER: &str = "Chrome";
const LINUX_PLATFORM: &str = "(X11; Linux x86_64)";
const WINDOWS_PLATFORM: &str = "(Windows NT 10.0; Win64; x64)";

/// Rewrite the reported user agent for use during navigation
#[must_use]
pub fn rewrite_user_agent(reported: &str, stealth: bool, info_url: &str) -> String {
    let mut ua = reported
        .replace(HEADLESS_MARKER, HEADFUL_MARKER)
        .replace(LINUX_PLATFORM, WINDOWS_PLATFORM);

    if !stealth {
        ua.push_str(&format!(" ({TOOL_NAME} {VERSION}; +{info_url})"));
    }
    ua
}
