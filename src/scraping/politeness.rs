//! Politeness controller for crawling
//!
//! Handles robots.txt parsing and per-domain rate limiting. The rate limiter
//! is the single authority for "when may this domain be fetched next": every
//! worker shares one instance, and slots are reserved under a lock before
//! anyone sleeps, so concurrent callers are spaced rather than racing.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::Instant as TokioInstant;
use url::Url;

use super::fetcher::{FetchError, FetchResult, PageFetcher};
use crate::config::CrawlConfig;

/// Upper bound applied to robots.txt `Crawl-delay`
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Rules extracted from a robots.txt file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    /// `Allow` path prefixes for `*` and bot user agents
    pub allowed: Vec<String>,
    /// `Disallow` path prefixes for `*` and bot user agents
    pub disallowed: Vec<String>,
    /// Largest `Crawl-delay` among applicable groups
    pub crawl_delay: Option<Duration>,
    /// Every `Sitemap:` URL, regardless of user-agent group
    pub sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Parse robots.txt content.
    ///
    /// A group applies when any of its `User-agent` lines is `*` or contains
    /// "bot". Rules from all applying groups are unioned.
    pub fn parse(content: &str) -> Self {
        let mut rules = RobotsRules::default();

        let mut group_applies = false;
        // Consecutive User-agent lines share one group
        let mut reading_agents = false;

        for raw in content.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !reading_agents {
                        group_applies = false;
                    }
                    reading_agents = true;
                    let agent = value.to_ascii_lowercase();
                    if agent == "*" || agent.contains("bot") {
                        group_applies = true;
                    }
                }
                "sitemap" => {
                    if !value.is_empty() && !rules.sitemaps.iter().any(|s| s == value) {
                        rules.sitemaps.push(value.to_string());
                    }
                }
                "disallow" => {
                    reading_agents = false;
                    if group_applies && !value.is_empty() {
                        push_unique(&mut rules.disallowed, value);
                    }
                }
                "allow" => {
                    reading_agents = false;
                    if group_applies && !value.is_empty() {
                        push_unique(&mut rules.allowed, value);
                    }
                }
                "crawl-delay" => {
                    reading_agents = false;
                    if group_applies {
                        if let Ok(secs) = value.parse::<f64>() {
                            if secs.is_finite() && secs >= 0.0 {
                                let delay = Duration::from_secs_f64(secs).min(MAX_CRAWL_DELAY);
                                rules.crawl_delay = Some(rules.crawl_delay.map_or(delay, |d| d.max(delay)));
                            }
                        }
                    }
                }
                _ => {
                    reading_agents = false;
                }
            }
        }

        rules
    }

    /// Check whether a path may be crawled
    pub fn is_path_allowed(&self, path: &str) -> bool {
        is_path_allowed(path, self)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty() && self.disallowed.is_empty() && self.crawl_delay.is_none()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Decide whether `path` may be crawled under `rules`.
///
/// A path matching a `Disallow` prefix is blocked unless an `Allow` prefix
/// at least as specific (as long) also matches it.
pub fn is_path_allowed(path: &str, rules: &RobotsRules) -> bool {
    let longest_disallow = rules
        .disallowed
        .iter()
        .filter(|p| path_matches(path, p))
        .map(|p| p.len())
        .max();

    let Some(longest_disallow) = longest_disallow else {
        return true;
    };

    rules
        .allowed
        .iter()
        .filter(|p| path_matches(path, p))
        .any(|p| p.len() >= longest_disallow)
}

/// Check if a path matches a robots.txt pattern (prefix, `*` wildcard, `$` anchor)
fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    let (pattern, must_end_match) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut pos = 0;

        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            match path[pos..].find(part) {
                Some(found) => {
                    if i == 0 && found != 0 {
                        return false;
                    }
                    pos += found + part.len();
                }
                None => return false,
            }
        }

        if must_end_match {
            return pos == path.len() || pattern.ends_with('*');
        }
        return true;
    }

    if must_end_match {
        return path == pattern;
    }

    path.starts_with(pattern)
}

/// Per-domain minimum-interval rate limiter.
///
/// Stores, per domain, the instant of the most recently reserved fetch. A
/// caller reserves `max(now, last + delay)` under the lock and then sleeps
/// until its slot, so N queued callers end up `delay` apart.
pub struct DomainRateLimiter {
    default_delay: Duration,
    slots: Mutex<HashMap<String, TokioInstant>>,
}

impl DomainRateLimiter {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    /// Effective delay: the default unless robots asks for more
    pub fn effective_delay(&self, crawl_delay: Option<Duration>) -> Duration {
        match crawl_delay {
            Some(d) => self.default_delay.max(d.min(MAX_CRAWL_DELAY)),
            None => self.default_delay,
        }
    }

    /// Reserve the next fetch slot for `domain`, returning how long to wait
    pub fn reserve(&self, domain: &str, crawl_delay: Option<Duration>) -> Duration {
        let delay = self.effective_delay(crawl_delay);
        let now = TokioInstant::now();
        let mut slots = self.slots.lock();

        let slot = match slots.get(domain) {
            Some(last) => (*last + delay).max(now),
            None => now,
        };
        slots.insert(domain.to_string(), slot);
        slot.saturating_duration_since(now)
    }

    /// Wait until `domain` may be fetched again and record the fetch
    pub async fn acquire(&self, domain: &str, crawl_delay: Option<Duration>) {
        let wait = self.reserve(domain, crawl_delay);
        if !wait.is_zero() {
            tracing::trace!(domain, wait_ms = wait.as_millis() as u64, "rate limited");
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of domains with a recorded fetch
    pub fn tracked_domains(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Cached robots.txt data for a domain
#[derive(Debug, Clone)]
struct CachedRobots {
    rules: RobotsRules,
    fetched_at: Instant,
}

/// Politeness controller managing robots.txt and rate limiting
pub struct PolitenessController {
    fetcher: Arc<dyn PageFetcher>,
    limiter: Arc<DomainRateLimiter>,
    robots_cache: Mutex<LruCache<String, CachedRobots>>,
    robots_ttl: Duration,
}

impl PolitenessController {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        limiter: Arc<DomainRateLimiter>,
        cache_size: usize,
        robots_ttl: Duration,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            fetcher,
            limiter,
            robots_cache: Mutex::new(LruCache::new(capacity)),
            robots_ttl,
        }
    }

    /// Build a controller with its own rate limiter from crawl settings
    pub fn from_config(fetcher: Arc<dyn PageFetcher>, config: &CrawlConfig) -> Self {
        let limiter = Arc::new(DomainRateLimiter::new(Duration::from_millis(
            config.default_delay_ms,
        )));
        Self::new(
            fetcher,
            limiter,
            config.robots_cache_size,
            Duration::from_secs(config.robots_cache_ttl_secs),
        )
    }

    pub fn limiter(&self) -> &Arc<DomainRateLimiter> {
        &self.limiter
    }

    /// Fetch and parse `https://{domain}/robots.txt`.
    ///
    /// Any failure (transport error, non-2xx) yields empty rules.
    pub async fn parse_robots(&self, domain: &str) -> RobotsRules {
        {
            let mut cache = self.robots_cache.lock();
            if let Some(cached) = cache.get(domain) {
                if cached.fetched_at.elapsed() < self.robots_ttl {
                    return cached.rules.clone();
                }
            }
        }

        let rules = match self.fetch_robots(domain).await {
            Ok(Some(content)) => RobotsRules::parse(&content),
            Ok(None) => RobotsRules::default(),
            Err(e) => {
                tracing::debug!(domain, "robots.txt unavailable: {}", e);
                RobotsRules::default()
            }
        };

        self.robots_cache.lock().put(
            domain.to_string(),
            CachedRobots {
                rules: rules.clone(),
                fetched_at: Instant::now(),
            },
        );
        rules
    }

    async fn fetch_robots(&self, domain: &str) -> Result<Option<String>, FetchError> {
        let robots_url = Url::parse(&format!("https://{}/robots.txt", domain))
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let response = self.fetch_polite(&robots_url, None).await?;
        if response.is_success() {
            Ok(Some(response.body))
        } else {
            Ok(None)
        }
    }

    /// Fetch a URL after waiting out the domain's minimum interval
    pub async fn fetch_polite(
        &self,
        url: &Url,
        crawl_delay: Option<Duration>,
    ) -> Result<FetchResult, FetchError> {
        let domain = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{} has no host", url)))?;
        self.limiter.acquire(domain, crawl_delay).await;
        self.fetcher.fetch(url).await
    }

    /// A [`PageFetcher`] whose every request goes through [`Self::fetch_polite`]
    pub fn polite(&self, crawl_delay: Option<Duration>) -> PoliteFetcher<'_> {
        PoliteFetcher {
            controller: self,
            crawl_delay,
        }
    }
}

/// Rate-limited view of a [`PolitenessController`], for code written
/// against a plain [`PageFetcher`] such as the sitemap parser
pub struct PoliteFetcher<'a> {
    controller: &'a PolitenessController,
    crawl_delay: Option<Duration>,
}

#[async_trait]
impl PageFetcher for PoliteFetcher<'_> {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError> {
        self.controller.fetch_polite(url, self.crawl_delay).await
    }

    fn user_agent(&self) -> &str {
        self.controller.fetcher.user_agent()
    }
}
