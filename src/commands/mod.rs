//! Command implementations for the `blockmine` binary

pub mod blocks;
pub mod crawl;
pub mod discover;
pub mod stats;

use anyhow::{Context as _, Result};
use std::sync::Arc;

use blockmine::config::Config;
use blockmine::scraping::{CrawlQueue, HttpFetcher, PageFetcher, PolitenessController};
use blockmine::store::{MemoryStore, SledBlobStore, Store};
use blockmine::types::Site;

/// Stores and shared services opened from the configuration
pub struct Context {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<SledBlobStore>,
}

impl Context {
    pub fn open(config: Config) -> Result<Self> {
        let store = MemoryStore::open(config.storage.snapshot_path())?;
        let blobs = SledBlobStore::open(config.storage.blob_path())?;
        Ok(Self {
            config,
            store: Arc::new(store),
            blobs: Arc::new(blobs),
        })
    }

    /// Write the store snapshot and flush blobs
    pub fn save(&self) -> Result<()> {
        self.store.save()?;
        self.blobs.flush()
    }

    pub fn fetcher(&self) -> Result<Arc<dyn PageFetcher>> {
        let fetcher = HttpFetcher::new(&self.config.crawl).context("Failed to build HTTP client")?;
        Ok(Arc::new(fetcher))
    }

    pub fn politeness(&self, fetcher: Arc<dyn PageFetcher>) -> Arc<PolitenessController> {
        Arc::new(PolitenessController::from_config(fetcher, &self.config.crawl))
    }

    pub fn queue(&self) -> Arc<CrawlQueue> {
        Arc::new(CrawlQueue::with_max_attempts(
            self.store.clone(),
            self.config.queue.max_attempts,
        ))
    }

    /// Find a site by id, then by domain
    pub async fn resolve_site(&self, site: &str) -> Result<Site> {
        if let Some(found) = self.store.get_site(site).await? {
            return Ok(found);
        }
        self.store
            .get_site_by_domain(&site.to_ascii_lowercase())
            .await?
            .with_context(|| format!("No site with id or domain '{}'", site))
    }
}
