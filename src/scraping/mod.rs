//! Crawling subsystem
//!
//! Key components:
//! - `PolitenessController`: robots.txt rules and per-domain rate limiting
//! - `PageFetcher` / `HttpFetcher`: HTTP GET with a fixed user agent
//! - `sitemap`: sitemap and sitemap-index parsing
//! - `CrawlQueue`: durable priority queue of crawl jobs with bounded retry
//! - `SiteCrawler`: per-site breadth-first crawl that persists pages
//! - `CrawlWorker`: claims queued jobs and runs site crawls

pub mod coordinator;
pub mod fetcher;
pub mod frontier;
pub mod politeness;
pub mod sitemap;

pub use coordinator::{CrawlOptions, CrawlResult, CrawlWorker, SiteCrawler};
pub use fetcher::{FetchError, FetchResult, HttpFetcher, PageFetcher};
pub use frontier::{CrawlQueue, QueueStats};
pub use politeness::{
    is_path_allowed, DomainRateLimiter, PoliteFetcher, PolitenessController, RobotsRules,
};
pub use sitemap::SitemapEntry;

/// Hostname suffixes of the platform's preview and live hosting.
///
/// Their robots.txt disallows everything, so they are never robots-checked.
pub const PREVIEW_HOST_SUFFIXES: &[&str] = &[".aem.page", ".aem.live", ".hlx.page", ".hlx.live"];

/// Whether a domain is served from the platform's preview/live hosting
pub fn is_preview_domain(domain: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    PREVIEW_HOST_SUFFIXES.iter().any(|s| domain.ends_with(s))
}

/// Canonical preview URL for a repository branch: `https://{branch}--{repo}--{owner}.aem.page/`
pub fn preview_url(owner: &str, repo: &str, branch: &str) -> String {
    format!(
        "https://{}--{}--{}.aem.page/",
        branch.to_ascii_lowercase(),
        repo.to_ascii_lowercase(),
        owner.to_ascii_lowercase()
    )
}

/// Normalize a URL for visited-set checks
///
/// - Strips fragments
/// - Removes trailing slashes from non-root paths
/// - Lowercases the host (the `url` crate already does this)
pub(crate) fn normalize_url(url: &url::Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(&path[..path.len() - 1]);
    }

    normalized.to_string()
}

/// Path plus query of a URL, used as the page key within a site
pub(crate) fn path_key(url: &url::Url) -> String {
    let path = url.path();
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    match url.query() {
        Some(q) => format!("{}?{}", path, q),
        None => path.to_string(),
    }
}
