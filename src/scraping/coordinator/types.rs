//! Crawl options, per-page records, and run results

use std::time::Duration;

use crate::config::CrawlConfig;
use crate::types::{CrawlStatus, RecordId, TemplateType};

/// Options for one site crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Upper bound on pages persisted in this run
    pub max_pages: usize,
    /// Skip robots-disallowed paths and honour `Crawl-delay`
    pub respect_robots: bool,
    /// Seed the frontier from the site's sitemaps
    pub include_sitemap: bool,
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            respect_robots: config.respect_robots,
            include_sitemap: config.include_sitemap,
        }
    }
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from_config(&CrawlConfig::default())
    }
}

/// A page persisted during a crawl
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub page_id: RecordId,
    pub url: String,
    pub path: String,
    pub template: TemplateType,
    pub block_count: usize,
    pub load_time_ms: u64,
}

/// Outcome of one site crawl
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub site_id: RecordId,
    pub domain: String,
    pub status: CrawlStatus,
    pub pages: Vec<CrawledPage>,
    /// Blocks counted across crawled pages (reporting only)
    pub blocks_found: usize,
    /// URLs contributed by sitemaps
    pub sitemap_urls: usize,
    /// URLs skipped because robots.txt disallows them
    pub skipped_by_robots: usize,
    /// Human-readable per-page and pipeline errors
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl CrawlResult {
    pub(super) fn new(site_id: RecordId, domain: String) -> Self {
        Self {
            site_id,
            domain,
            status: CrawlStatus::InProgress,
            pages: Vec::new(),
            blocks_found: 0,
            sitemap_urls: 0,
            skipped_by_robots: 0,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn pages_crawled(&self) -> usize {
        self.pages.len()
    }

    pub fn is_success(&self) -> bool {
        self.status == CrawlStatus::Complete
    }
}
