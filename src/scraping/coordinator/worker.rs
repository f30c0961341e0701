//! Queue-driven crawl worker

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

use super::{CrawlOptions, CrawlResult, SiteCrawler};
use crate::scraping::frontier::CrawlQueue;
use crate::store::Store;
use crate::types::{CrawlJob, CrawlStatus, Site};

/// What happened to one claimed job
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: String,
    pub url: String,
    /// Job status after completion (`pending` when requeued for retry)
    pub job_status: CrawlStatus,
    pub crawl: Option<CrawlResult>,
}

/// Totals for a worker run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub jobs_processed: usize,
    pub jobs_complete: usize,
    pub jobs_requeued: usize,
    pub jobs_failed: usize,
    pub pages_crawled: usize,
}

impl WorkerSummary {
    fn record(&mut self, outcome: &JobOutcome) {
        self.jobs_processed += 1;
        match outcome.job_status {
            CrawlStatus::Complete => self.jobs_complete += 1,
            CrawlStatus::Pending => self.jobs_requeued += 1,
            _ => self.jobs_failed += 1,
        }
        if let Some(ref crawl) = outcome.crawl {
            self.pages_crawled += crawl.pages_crawled();
        }
    }
}

/// Claims crawl jobs and runs the site crawl each one names
pub struct CrawlWorker {
    queue: Arc<CrawlQueue>,
    crawler: Arc<SiteCrawler>,
    store: Arc<dyn Store>,
    options: CrawlOptions,
    idle_poll: Duration,
}

impl CrawlWorker {
    pub fn new(
        queue: Arc<CrawlQueue>,
        crawler: Arc<SiteCrawler>,
        store: Arc<dyn Store>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            queue,
            crawler,
            store,
            options,
            idle_poll: Duration::from_secs(1),
        }
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Claim and process one job. `Ok(None)` when the queue has nothing claimable.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(None);
        };

        let crawl = match self.resolve_site(&job).await {
            Ok(site) => self.crawler.crawl_site(&site.id, &self.options).await,
            Err(e) => Err(e),
        };

        let (status, error, crawl) = match crawl {
            Ok(result) if result.is_success() => (CrawlStatus::Complete, None, Some(result)),
            Ok(result) => {
                let error = result.errors.join("; ");
                (CrawlStatus::Failed, Some(error), Some(result))
            }
            Err(e) => (CrawlStatus::Failed, Some(format!("{:#}", e)), None),
        };

        let job = self.queue.complete(&job.id, status, error).await?;
        Ok(Some(JobOutcome {
            job_id: job.id,
            url: job.url,
            job_status: job.status,
            crawl,
        }))
    }

    /// Process jobs until none are claimable
    pub async fn run_until_idle(&self) -> Result<WorkerSummary> {
        let mut summary = WorkerSummary::default();
        while let Some(outcome) = self.run_once().await? {
            summary.record(&outcome);
        }
        Ok(summary)
    }

    /// Process jobs until `shutdown` flips to `true`, polling while idle
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<WorkerSummary> {
        let mut summary = WorkerSummary::default();
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.run_once().await {
                Ok(Some(outcome)) => summary.record(&outcome),
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.idle_poll) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("worker iteration failed: {:#}", e);
                    tokio::time::sleep(self.idle_poll).await;
                }
            }
        }
        Ok(summary)
    }

    /// Site the job targets: its bound site, else one keyed by the URL's host
    async fn resolve_site(&self, job: &CrawlJob) -> Result<Site> {
        if let Some(ref site_id) = job.site_id {
            if let Some(site) = self.store.get_site(site_id).await? {
                return Ok(site);
            }
        }

        let url = Url::parse(&job.url)?;
        let domain = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("Job URL {} has no host", job.url))?
            .to_ascii_lowercase();
        self.store.upsert_site(&Site::new(domain, None)).await
    }
}
