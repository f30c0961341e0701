//! Repository discovery
//!
//! Three resumable stages locate sites built on the block convention:
//! 1. `discover_contributors`: contributors of seed repositories become Developers
//! 2. `scan_developers`: top developers' repositories, organizations and relevant stars
//! 3. `verify_repositories`: structural markers, optional live check, Site + crawl job
//!
//! Each stage records per-item failures in its result and keeps going.

mod contributors;
mod host;
mod scan;
mod verify;

pub use contributors::ContributorResult;
pub use host::{CodeHost, CodeHostError, Contributor, GitHubClient, RepoSummary};
pub use scan::{developer_provenance, org_provenance, starred_provenance, ScanResult};
pub use verify::{
    check_live, check_structure, LiveCheck, StructuralCheck, VerifyResult, CORE_SCRIPT,
    LIVE_CONFIRM_THRESHOLD, MARKERS,
};

use std::sync::Arc;

use crate::config::DiscoveryConfig;
use crate::scraping::{CrawlQueue, PageFetcher};
use crate::store::Store;

/// Results of a full discovery run
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub contributors: ContributorResult,
    pub scan: ScanResult,
    pub verify: VerifyResult,
}

impl DiscoveryReport {
    pub fn error_count(&self) -> usize {
        self.contributors.errors.len() + self.scan.errors.len() + self.verify.errors.len()
    }
}

/// Runs the discovery stages against a code host and the store
pub struct DiscoveryPipeline {
    host: Arc<dyn CodeHost>,
    store: Arc<dyn Store>,
    config: DiscoveryConfig,
    /// Used for live preview checks
    fetcher: Option<Arc<dyn PageFetcher>>,
    /// Receives crawl jobs for verified sites
    queue: Option<Arc<CrawlQueue>>,
}

impl DiscoveryPipeline {
    pub fn new(host: Arc<dyn CodeHost>, store: Arc<dyn Store>, config: DiscoveryConfig) -> Self {
        Self {
            host,
            store,
            config,
            fetcher: None,
            queue: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_queue(mut self, queue: Arc<CrawlQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    /// Run all three stages in order
    pub async fn run(&self) -> anyhow::Result<DiscoveryReport> {
        let contributors = self.discover_contributors().await?;
        let scan = self.scan_developers().await?;
        let verify = self.verify_repositories().await?;
        Ok(DiscoveryReport {
            contributors,
            scan,
            verify,
        })
    }
}
