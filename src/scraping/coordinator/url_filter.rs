//! Internal link discovery

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Link schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "data:"];

/// Extensions of downloads and static assets
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".gz", ".tar", ".dmg", ".exe", ".doc", ".docx", ".xls", ".xlsx", ".ppt",
    ".pptx", ".csv", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".avif", ".ico", ".mp3",
    ".mp4", ".webm", ".mov", ".css", ".js", ".json", ".xml", ".woff", ".woff2", ".ttf",
];

/// Path prefixes of APIs and static trees
const SKIPPED_PREFIXES: &[&str] = &[
    "/api/",
    "/static/",
    "/assets/",
    "/_next/",
    "/cdn-cgi/",
    "/wp-json/",
    "/media_",
    "/.well-known/",
];

/// Same-domain links from `html` worth crawling, resolved against `base`.
///
/// Fragments are dropped and duplicates removed; order follows the document.
pub(super) fn discover_internal_links(html: &str, base: &Url, domain: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let lower = href.to_ascii_lowercase();
        if SKIPPED_SCHEMES.iter().any(|s| lower.starts_with(s)) {
            continue;
        }

        let Ok(mut url) = base.join(href) else {
            continue;
        };
        url.set_fragment(None);

        if is_crawlable(&url, domain) && seen.insert(url.as_str().to_string()) {
            urls.push(url);
        }
    }

    urls
}

/// Whether `host` belongs to the site at `domain`, treating `www.` as optional
pub(super) fn same_site(host: &str, domain: &str) -> bool {
    fn bare(h: &str) -> &str {
        h.strip_prefix("www.").unwrap_or(h)
    }
    bare(&host.to_ascii_lowercase()).eq_ignore_ascii_case(bare(&domain.to_ascii_lowercase()))
}

fn is_crawlable(url: &Url, domain: &str) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    if !url.host_str().map_or(false, |h| same_site(h, domain)) {
        return false;
    }

    let path = url.path().to_ascii_lowercase();
    if SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }
    !SKIPPED_PREFIXES.iter().any(|p| path.starts_with(p))
}
