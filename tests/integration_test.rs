//! Integration tests for blockmine
//!
//! These tests drive the pipeline end to end against canned network fakes.

use blockmine::{
    config::{Config, DiscoveryConfig},
    discovery::{DiscoveryPipeline, RepoSummary, CORE_SCRIPT},
    extraction::{InteractivityFlags, SiteExtractor},
    scoring::{BatchScorer, QualityScorer, QualityTier},
    scraping::{
        CrawlOptions, CrawlQueue, CrawlWorker, DomainRateLimiter, PolitenessController,
        SiteCrawler,
    },
    store::{block_html_key, page_html_key, BlobStore, MemoryStore, SledBlobStore, Store},
    testing::{StaticCodeHost, StaticFetcher},
    types::{CrawlStatus, Site},
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const PREVIEW: &str = "https://main--site--acme.aem.page/";

const HOME: &str = r#"<html><head><script src="/scripts/aem.js" type="module"></script></head>
<body><main>
  <div class="section">
    <div class="hero-wrapper">
      <div class="hero block"><div><div>
        <picture><source srcset="/hero.webp"><img src="/hero.jpg" alt="Hero" loading="lazy" width="1200" height="600"></picture>
        <h1>Welcome</h1>
      </div></div></div>
    </div>
  </div>
  <div class="section">
    <div class="cards-wrapper">
      <div class="cards block"><div><div><h2>One</h2><p><a href="/products">Products</a></p></div></div></div>
    </div>
  </div>
</main></body></html>"#;

const PRODUCTS: &str = r##"<html><body><main>
  <div class="section">
    <div class="legacy" style="width: 1400px"><font>Old</font><a href="#">x</a><li>y</li><script>track()</script></div>
  </div>
</main></body></html>"##;

fn preview_fetcher() -> Arc<StaticFetcher> {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.add_page(PREVIEW, HOME);
    fetcher.add_page("https://main--site--acme.aem.page/products", PRODUCTS);
    fetcher
}

/// Test the complete discovery, crawl, extraction and scoring pipeline
#[tokio::test]
async fn test_discovery_to_scored_blocks() {
    let temp_dir = TempDir::new().unwrap();

    let host = Arc::new(StaticCodeHost::new());
    host.add_contributor("adobe/aem-boilerplate", "alice", 150);
    host.add_user_repo("alice", RepoSummary::new("acme/site", "main"));
    host.add_path("acme/site", "main", CORE_SCRIPT);
    host.add_path("acme/site", "main", "blocks");
    host.add_path("acme/site", "main", "fstab.yaml");

    let fetcher = preview_fetcher();
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(SledBlobStore::open(temp_dir.path().join("blobs")).unwrap());
    let queue = Arc::new(CrawlQueue::new(store.clone()));

    // Discovery
    let config = DiscoveryConfig {
        seed_repositories: vec!["adobe/aem-boilerplate".into()],
        well_known_orgs: vec![],
        ..Default::default()
    };
    let discovery = DiscoveryPipeline::new(host, store.clone(), config)
        .with_fetcher(fetcher.clone())
        .with_queue(queue.clone());
    let report = discovery.run().await.unwrap();
    assert_eq!(report.error_count(), 0);
    assert_eq!(report.contributors.developers_found, 1);
    assert_eq!(report.scan.repositories_added, 1);
    assert_eq!(report.verify.sites_created, 1);
    assert_eq!(report.verify.jobs_enqueued, 1);

    // Crawl through the queue
    let politeness = Arc::new(PolitenessController::new(
        fetcher.clone(),
        Arc::new(DomainRateLimiter::new(Duration::ZERO)),
        16,
        Duration::from_secs(60),
    ));
    let crawler = Arc::new(SiteCrawler::new(store.clone(), blobs.clone(), politeness));
    let worker = CrawlWorker::new(queue.clone(), crawler, store.clone(), CrawlOptions::default());
    let summary = worker.run_until_idle().await.unwrap();
    assert_eq!(summary.jobs_complete, 1);
    assert_eq!(summary.pages_crawled, 2);
    // Preview hosting is never robots-checked
    assert_eq!(fetcher.request_count("https://main--site--acme.aem.page/robots.txt"), 0);

    let site = store
        .get_site_by_domain("main--site--acme.aem.page")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(site.status, CrawlStatus::Complete);
    assert_eq!(site.page_count, 2);
    for page in store.list_pages(&site.id).await.unwrap() {
        assert!(blobs.get(&page_html_key(&site.id, &page.id)).await.unwrap().is_some());
    }

    // Extraction
    let extraction = SiteExtractor::new(store.clone(), blobs.clone())
        .extract_site(&site.id)
        .await
        .unwrap();
    assert_eq!(extraction.blocks_extracted, 3);
    assert!(extraction.errors.is_empty());
    let design = store.get_design_system(&site.id).await.unwrap().unwrap();
    assert_eq!(design.block_count, 3);

    // Scoring
    let scoring = BatchScorer::new(store.clone(), blobs.clone())
        .score_site(&site.id, false)
        .await
        .unwrap();
    assert_eq!(scoring.blocks_scored, 3);
    assert_eq!(scoring.blocks_pruned, 0);

    let scored = store.list_blocks(&site.id).await.unwrap();
    let score_of = |name: &str| {
        scored
            .iter()
            .find(|b| b.name == name)
            .and_then(|b| b.quality_score)
            .unwrap()
    };
    let legacy = score_of("legacy");
    assert!(score_of("hero") > legacy);
    assert!(score_of("cards") > legacy);

    // Pruning drops everything under the floor
    let pruned = BatchScorer::new(store.clone(), blobs.clone())
        .with_prune_floor(legacy + 1)
        .score_site(&site.id, true)
        .await
        .unwrap();
    assert_eq!(pruned.blocks_pruned, 1);

    let remaining = store.list_blocks(&site.id).await.unwrap();
    let names: Vec<&str> = remaining.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(!names.contains(&"legacy"));
    for block in &remaining {
        let score = block.quality_score.unwrap();
        assert_eq!(block.quality_tier, Some(QualityTier::from_score(score)));
        assert!(blobs.get(&block_html_key(&site.id, &block.id)).await.unwrap().is_some());
    }

    let site = store.get_site(&site.id).await.unwrap().unwrap();
    assert_eq!(site.block_count, 2);
    assert!(site.avg_quality_score.unwrap() > legacy as f64);
}

/// Records written by one invocation are visible to the next
#[tokio::test]
async fn test_snapshot_persists_between_runs() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");

    let site_id = {
        let store = Arc::new(MemoryStore::open(&path).unwrap());
        let site = store.upsert_site(&Site::new("acme.example", None)).await.unwrap();
        let queue = CrawlQueue::new(store.clone());
        queue.enqueue("https://acme.example/", Some(site.id.clone()), 5).await.unwrap();
        store.save().unwrap();
        site.id
    };

    let store = Arc::new(MemoryStore::open(&path).unwrap());
    assert!(store.get_site(&site_id).await.unwrap().is_some());
    let stats = CrawlQueue::new(store.clone()).stats().await.unwrap();
    assert_eq!(stats.pending, 1);
}

/// The scorer honours its invariants on arbitrary real-world markup
#[test]
fn test_scorer_invariants_on_crawled_markup() {
    let scorer = QualityScorer::new();
    for html in [HOME, PRODUCTS, "", "<div>"] {
        let report = scorer.score(html, &InteractivityFlags::default());
        assert!(report.overall <= 100);
        assert_eq!(report.overall, report.breakdown.overall());
        assert_eq!(report.tier, QualityTier::from_score(report.overall));
    }
}

#[test]
fn test_default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}
