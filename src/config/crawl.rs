//! Crawl, politeness, and queue configuration

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// Site crawl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// User agent sent with every request (pages, robots.txt, sitemaps)
    pub user_agent: String,
    /// Minimum delay between two fetches to the same domain (milliseconds)
    pub default_delay_ms: u64,
    /// Request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Maximum response body size in bytes
    pub max_content_size: usize,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Page budget per site crawl
    pub max_pages: usize,
    /// Honor robots.txt rules
    pub respect_robots: bool,
    /// Seed the crawl with sitemap URLs
    pub include_sitemap: bool,
    /// Number of domains whose robots.txt is cached
    pub robots_cache_size: usize,
    /// robots.txt cache TTL (seconds)
    pub robots_cache_ttl_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_delay_ms: 3000,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_content_size: 10 * 1024 * 1024, // 10 MB
            max_redirects: 10,
            max_pages: 50,
            respect_robots: true,
            include_sitemap: true,
            robots_cache_size: 1000,
            robots_cache_ttl_secs: 86400, // 24 hours
        }
    }
}

/// Crawl job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts before a job is permanently failed
    pub max_attempts: u32,
    /// Concurrent crawl workers
    pub workers: usize,
    /// How long an idle worker waits before polling again (milliseconds)
    pub idle_poll_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::types::DEFAULT_MAX_ATTEMPTS,
            workers: 2,
            idle_poll_ms: 1000,
        }
    }
}
