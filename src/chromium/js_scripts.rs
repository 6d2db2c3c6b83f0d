//! JavaScript evaluated in captured pages

/// Absolute URLs of every `a[href]` and `area[href]`, deduplicated, in document order
pub const OUTLINKS_SCRIPT: &str = r"
    (() => {
        const seen = new Set();
        const outlinks = [];
        for (const el of document.querySelectorAll('a[href], area[href]')) {
            const href = el.getAttribute('href');
            if (!href) continue;

            try {
                const absoluteUrl = new URL(href, document.baseURI).href;
                if (!seen.has(absoluteUrl)) {
                    seen.add(absoluteUrl);
                    outlinks.push(absoluteUrl);
                }
            } catch (e) {
                // unparseable href
            }
        }
        return outlinks;
    })()
";

/// Hides the automation markers headless Chrome exposes to page scripts
pub const STEALTH_SCRIPT: &str = r"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });

    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {};
    }

    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en']
    });
";

/// Same-document navigation to `fragment`, as a JSON-quoted string literal
pub fn set_hash_script(fragment: &str) -> String {
    let quoted = serde_json::to_string(fragment).unwrap_or_else(|_| "\"\"".to_string());
    format!("window.location.hash = {quoted};")
}
