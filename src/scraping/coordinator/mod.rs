//! Site crawl orchestration
//!
//! `SiteCrawler` crawls one site: it resolves robots rules, seeds a frontier
//! from the homepage, sitemaps and a list of common paths, then walks the
//! frontier breadth-first (newly discovered links are appended) until the
//! page budget is spent. Each fetched page is persisted twice under the same
//! id: the `Page` record in the relational store and the raw HTML in the blob
//! store. A failing page is recorded and skipped; it never aborts the run.

mod template;
mod types;
mod url_filter;
mod worker;

pub use types::*;
pub use worker::{CrawlWorker, JobOutcome, WorkerSummary};

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

use super::fetcher::FetchResult;
use super::politeness::{PolitenessController, RobotsRules};
use super::{is_preview_domain, path_key, sitemap};
use crate::extraction::BlockExtractor;
use crate::store::{page_html_key, BlobStore, Store};
use crate::types::{new_id, ContentHash, CrawlStatus, Page, Site};

/// Content paths probed on every site in addition to discovered links
pub const COMMON_PATHS: &[&str] = &[
    "/about",
    "/about-us",
    "/contact",
    "/contact-us",
    "/products",
    "/services",
    "/solutions",
    "/features",
    "/pricing",
    "/blog",
    "/news",
    "/events",
    "/resources",
    "/careers",
    "/team",
    "/partners",
    "/customers",
    "/case-studies",
    "/press",
    "/faq",
    "/support",
    "/help",
    "/docs",
    "/privacy",
    "/terms",
];

/// Crawls one site into Page records and stored HTML
pub struct SiteCrawler {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    politeness: Arc<PolitenessController>,
    extractor: BlockExtractor,
}

impl SiteCrawler {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        politeness: Arc<PolitenessController>,
    ) -> Self {
        Self {
            store,
            blobs,
            politeness,
            extractor: BlockExtractor::new(),
        }
    }

    /// Crawl the site with id `site_id`.
    ///
    /// Returns `Err` only when the site cannot be loaded or its final state
    /// cannot be saved. Everything else lands in `CrawlResult::errors`.
    pub async fn crawl_site(&self, site_id: &str, options: &CrawlOptions) -> Result<CrawlResult> {
        let start = Instant::now();
        let mut site = self
            .store
            .get_site(site_id)
            .await?
            .with_context(|| format!("Site {} not found", site_id))?;

        site.status = CrawlStatus::InProgress;
        site.updated_at = Utc::now();
        self.store.update_site(&site).await?;

        tracing::info!(site_id, domain = %site.domain, max_pages = options.max_pages, "crawling site");

        let mut result = CrawlResult::new(site.id.clone(), site.domain.clone());
        match self.walk(&site, options, &mut result).await {
            Ok(()) => result.status = CrawlStatus::Complete,
            Err(e) => {
                tracing::error!(site_id, "crawl failed: {:#}", e);
                result.errors.push(format!("crawl aborted: {:#}", e));
                result.status = CrawlStatus::Failed;
            }
        }

        site.status = result.status;
        site.page_count = self.store.count_pages(&site.id).await.unwrap_or(site.page_count as usize) as u32;
        site.updated_at = Utc::now();
        self.store.update_site(&site).await?;

        result.duration = start.elapsed();
        tracing::info!(
            site_id,
            pages = result.pages_crawled(),
            blocks = result.blocks_found,
            errors = result.errors.len(),
            status = %result.status,
            "site crawl finished"
        );
        Ok(result)
    }

    async fn walk(&self, site: &Site, options: &CrawlOptions, result: &mut CrawlResult) -> Result<()> {
        let domain = site.domain.as_str();
        let homepage = Url::parse(&format!("https://{}/", domain))
            .with_context(|| format!("Invalid site domain {}", domain))?;

        let preview = is_preview_domain(domain);
        let rules = if preview {
            RobotsRules::default()
        } else {
            self.politeness.parse_robots(domain).await
        };
        let enforce_robots = options.respect_robots && !preview;
        let crawl_delay = if options.respect_robots { rules.crawl_delay } else { None };

        let mut frontier: Vec<Url> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut push = |url: Url, frontier: &mut Vec<Url>| {
            if seen.insert(path_key(&url)) {
                frontier.push(url);
                true
            } else {
                false
            }
        };

        push(homepage.clone(), &mut frontier);

        if options.include_sitemap {
            let sitemap_urls = if rules.sitemaps.is_empty() {
                vec![format!("https://{}/sitemap.xml", domain)]
            } else {
                rules.sitemaps.clone()
            };
            for sitemap_url in &sitemap_urls {
                let fetcher = self.politeness.polite(crawl_delay);
                let entries = sitemap::parse_sitemap(&fetcher, sitemap_url).await;
                for entry in entries {
                    let Ok(url) = Url::parse(&entry.loc) else {
                        continue;
                    };
                    let same_host = url.host_str().map_or(false, |h| url_filter::same_site(h, domain));
                    if same_host && push(url, &mut frontier) {
                        result.sitemap_urls += 1;
                    }
                }
            }
        }

        for path in COMMON_PATHS {
            if let Ok(url) = homepage.join(path) {
                push(url, &mut frontier);
            }
        }

        let mut index = 0;
        while index < frontier.len() && result.pages.len() < options.max_pages {
            let url = frontier[index].clone();
            index += 1;

            if enforce_robots && !rules.is_path_allowed(&path_key(&url)) {
                tracing::debug!(url = %url, "disallowed by robots.txt");
                result.skipped_by_robots += 1;
                continue;
            }

            let response = match self.politeness.fetch_polite(&url, crawl_delay).await {
                Ok(r) => r,
                Err(e) => {
                    result.errors.push(format!("{}: {}", url, e));
                    continue;
                }
            };
            if !response.is_success() {
                tracing::debug!(url = %url, status = response.status_code, "skipping non-success response");
                continue;
            }
            if !response.content_type().contains("html") {
                continue;
            }

            match self.persist_page(site, &url, &response).await {
                Ok(page) => {
                    result.blocks_found += page.block_count;
                    result.pages.push(page);
                }
                Err(e) => {
                    result.errors.push(format!("{}: {:#}", url, e));
                    continue;
                }
            }

            for link in url_filter::discover_internal_links(&response.body, &response.final_url, domain) {
                push(link, &mut frontier);
            }
        }

        Ok(())
    }

    async fn persist_page(&self, site: &Site, url: &Url, response: &FetchResult) -> Result<CrawledPage> {
        let path = path_key(url);
        let template = template::infer_template(&path, &response.body);
        let block_count = self.extractor.extract(&response.body).len();
        let load_time_ms = response.fetch_duration.as_millis() as u64;

        let page = Page {
            id: new_id(),
            site_id: site.id.clone(),
            path: path.clone(),
            url: url.to_string(),
            template,
            content_hash: ContentHash::compute(&response.body),
            load_time_ms,
            screenshot_key: None,
            metadata: serde_json::json!({
                "status_code": response.status_code,
                "final_url": response.final_url.as_str(),
                "block_count": block_count,
            }),
            crawled_at: Utc::now(),
        };

        let stored = self
            .store
            .upsert_page(&page)
            .await
            .with_context(|| format!("Failed to save page {}", path))?;
        self.blobs
            .put(
                &page_html_key(&site.id, &stored.id),
                response.body.as_bytes().to_vec(),
                "text/html",
            )
            .await
            .with_context(|| format!("Failed to store HTML for {}", path))?;

        tracing::debug!(url = %url, template = template.as_str(), blocks = block_count, "page saved");

        Ok(CrawledPage {
            page_id: stored.id,
            url: url.to_string(),
            path,
            template,
            block_count,
            load_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::{DomainRateLimiter, FetchError, PageFetcher};
    use crate::store::{MemoryBlobStore, MemoryStore};
    use crate::testing::StaticFetcher;
    use std::time::Duration;

    const HOME: &str = r#"<html><body><main>
        <div class="section"><div class="hero"><h1>Welcome</h1></div></div>
        <a href="/products/widget">Widget</a>
        <a href="mailto:sales@acme.example">Sales</a>
    </main></body></html>"#;

    fn crawler(fetcher: Arc<StaticFetcher>) -> (SiteCrawler, Arc<MemoryStore>, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let politeness = Arc::new(PolitenessController::new(
            fetcher,
            Arc::new(DomainRateLimiter::new(Duration::ZERO)),
            16,
            Duration::from_secs(60),
        ));
        (
            SiteCrawler::new(store.clone(), blobs.clone(), politeness),
            store,
            blobs,
        )
    }

    #[tokio::test]
    async fn test_crawl_persists_pages_and_follows_links() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.add_page("https://acme.example/", HOME);
        fetcher.add_page(
            "https://acme.example/products/widget",
            r#"<main><div class="section"><div class="cards"><p>x</p></div></div></main>"#,
        );
        fetcher.add_page("https://acme.example/about", "<main><p>About</p></main>");

        let (crawler, store, blobs) = crawler(fetcher);
        let site = store.upsert_site(&Site::new("acme.example", None)).await.unwrap();

        let result = crawler.crawl_site(&site.id, &CrawlOptions::default()).await.unwrap();
        assert_eq!(result.status, CrawlStatus::Complete);
        assert_eq!(result.pages_crawled(), 3);
        assert_eq!(result.blocks_found, 2);

        let pages = store.list_pages(&site.id).await.unwrap();
        assert_eq!(pages.len(), 3);
        for page in &pages {
            let html = blobs.get(&page_html_key(&site.id, &page.id)).await.unwrap();
            assert!(html.is_some(), "missing HTML for {}", page.path);
        }

        let site = store.get_site(&site.id).await.unwrap().unwrap();
        assert_eq!(site.status, CrawlStatus::Complete);
        assert_eq!(site.page_count, 3);
    }

    #[tokio::test]
    async fn test_page_budget_is_respected() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.add_page("https://acme.example/", HOME);
        for path in COMMON_PATHS {
            fetcher.add_page(&format!("https://acme.example{}", path), "<main></main>");
        }

        let (crawler, store, _) = crawler(fetcher);
        let site = store.upsert_site(&Site::new("acme.example", None)).await.unwrap();
        let options = CrawlOptions {
            max_pages: 4,
            ..CrawlOptions::default()
        };
        let result = crawler.crawl_site(&site.id, &options).await.unwrap();
        assert_eq!(result.pages_crawled(), 4);
    }

    #[tokio::test]
    async fn test_robots_disallow_root_crawls_nothing() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.add_page(
            "https://x.example/robots.txt",
            "User-agent: *\nDisallow: /\nSitemap: https://x.example/sitemap.xml",
        );
        fetcher.add_page(
            "https://x.example/sitemap.xml",
            "<urlset><url><loc>https://x.example/a</loc></url><url><loc>https://x.example/b</loc></url></urlset>",
        );
        fetcher.add_page("https://x.example/", HOME);

        let (crawler, store, _) = crawler(fetcher.clone());
        let site = store.upsert_site(&Site::new("x.example", None)).await.unwrap();
        let result = crawler.crawl_site(&site.id, &CrawlOptions::default()).await.unwrap();

        assert_eq!(result.pages_crawled(), 0);
        assert_eq!(result.sitemap_urls, 2);
        assert_eq!(fetcher.request_count("https://x.example/sitemap.xml"), 1);
        assert_eq!(fetcher.request_count("https://x.example/"), 0);
        assert_eq!(result.status, CrawlStatus::Complete);
    }

    #[tokio::test]
    async fn test_preview_domain_ignores_robots() {
        let fetcher = Arc::new(StaticFetcher::new());
        let domain = "main--site--acme.aem.page";
        fetcher.add_page(&format!("https://{}/robots.txt", domain), "User-agent: *\nDisallow: /\n");
        fetcher.add_page(&format!("https://{}/", domain), HOME);

        let (crawler, store, _) = crawler(fetcher.clone());
        let site = store.upsert_site(&Site::new(domain, None)).await.unwrap();
        let result = crawler.crawl_site(&site.id, &CrawlOptions::default()).await.unwrap();

        assert_eq!(result.pages_crawled(), 1);
        assert_eq!(fetcher.request_count(&format!("https://{}/robots.txt", domain)), 0);
    }

    #[tokio::test]
    async fn test_fetch_errors_are_collected() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.add_page("https://acme.example/", HOME);
        fetcher.fail_with("https://acme.example/products/widget", "connection reset");

        let (crawler, store, _) = crawler(fetcher);
        let site = store.upsert_site(&Site::new("acme.example", None)).await.unwrap();
        let result = crawler.crawl_site(&site.id, &CrawlOptions::default()).await.unwrap();

        assert_eq!(result.status, CrawlStatus::Complete);
        assert_eq!(result.pages_crawled(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("connection reset"));
    }

    /// Records when each request was issued
    struct TimedFetcher {
        inner: StaticFetcher,
        log: parking_lot::Mutex<Vec<(String, tokio::time::Instant)>>,
    }

    #[async_trait::async_trait]
    impl PageFetcher for TimedFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError> {
            self.log.lock().push((url.to_string(), tokio::time::Instant::now()));
            self.inner.fetch(url).await
        }

        fn user_agent(&self) -> &str {
            self.inner.user_agent()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_request_to_a_domain_is_spaced_by_the_delay() {
        let inner = StaticFetcher::new();
        inner.add_page(
            "https://acme.example/robots.txt",
            "User-agent: *\nAllow: /\nSitemap: https://acme.example/sitemap.xml",
        );
        inner.add_page(
            "https://acme.example/sitemap.xml",
            "<urlset><url><loc>https://acme.example/products/widget</loc></url></urlset>",
        );
        inner.add_page("https://acme.example/", HOME);
        inner.add_page("https://acme.example/products/widget", "<main><p>Widget</p></main>");
        let fetcher = Arc::new(TimedFetcher {
            inner,
            log: parking_lot::Mutex::new(Vec::new()),
        });

        let store = Arc::new(MemoryStore::new());
        let politeness = Arc::new(PolitenessController::new(
            fetcher.clone(),
            Arc::new(DomainRateLimiter::new(Duration::from_secs(3))),
            16,
            Duration::from_secs(60),
        ));
        let crawler = SiteCrawler::new(store.clone(), Arc::new(MemoryBlobStore::new()), politeness);
        let site = store.upsert_site(&Site::new("acme.example", None)).await.unwrap();
        let options = CrawlOptions {
            max_pages: 2,
            ..CrawlOptions::default()
        };
        let result = crawler.crawl_site(&site.id, &options).await.unwrap();
        assert_eq!(result.pages_crawled(), 2);

        let log = fetcher.log.lock().clone();
        let urls: Vec<&str> = log.iter().take(3).map(|(u, _)| u.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.example/robots.txt",
                "https://acme.example/sitemap.xml",
                "https://acme.example/",
            ]
        );
        for pair in log.windows(2) {
            assert!(
                pair[1].1 - pair[0].1 >= Duration::from_secs(3),
                "{} followed {} too soon",
                pair[1].0,
                pair[0].0
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_site_is_an_error() {
        let (crawler, _, _) = crawler(Arc::new(StaticFetcher::new()));
        assert!(crawler.crawl_site("missing", &CrawlOptions::default()).await.is_err());
    }
}
