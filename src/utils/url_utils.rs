//! URL helpers used when naming capture records and sequencing page visits.

use url::Url;

/// WHATWG serialization of a job URL
///
/// Lowercases scheme and host, drops default ports, resolves dot segments and
/// percent-encodes characters the URL standard disallows. Query order, existing
/// escapes and the fragment are left alone. URLs that do not parse are returned
/// verbatim so that record naming never fails an attempt.
#[must_use]
pub fn canonicalize_url(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => parsed.to_string(),
        Err(e) => {
            log::debug!("Could not canonicalize {url}: {e}");
            url.to_string()
        }
    }
}

/// Check if a URL is an http(s) URL worth reporting as an outlink
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    // Skip data URLs, javascript URLs, and other non-http schemes
    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Same-document anchor targets of `page_url` among `outlinks`
///
/// Returns each distinct fragment URL that points back at the page itself,
/// in first-seen order. Empty fragments are skipped.
#[must_use]
pub fn same_page_anchors(page_url: &str, outlinks: &[String]) -> Vec<String> {
    let Ok(mut page) = Url::parse(page_url) else {
        return Vec::new();
    };
    page.set_fragment(None);

    let mut anchors: Vec<String> = Vec::new();
    for link in outlinks {
        let Ok(mut candidate) = Url::parse(link) else {
            continue;
        };
        let has_fragment = candidate.fragment().is_some_and(|f| !f.is_empty());
        if !has_fragment {
            continue;
        }
        let full = candidate.to_string();
        candidate.set_fragment(None);
        if candidate == page && !anchors.contains(&full) {
            anchors.push(full);
        }
    }
    anchors
}
