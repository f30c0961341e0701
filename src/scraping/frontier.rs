//! Crawl job queue
//!
//! A durable priority queue of [`CrawlJob`]s on top of the relational store.
//! Ordering is priority ascending (lower number first), then creation time.
//! Delivery is at-least-once: a claim flips the job to `in_progress` and
//! bumps its attempt counter in one atomic store operation, and a failure
//! short of the attempt cap puts the job back to `pending`.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::Store;
use crate::types::{CrawlJob, CrawlStatus, RecordId, DEFAULT_MAX_ATTEMPTS};

/// Job counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub in_progress: usize,
    pub complete: usize,
    pub failed: usize,
}

impl QueueStats {
    fn from_counts(counts: &HashMap<CrawlStatus, usize>) -> Self {
        let get = |s: CrawlStatus| counts.get(&s).copied().unwrap_or(0);
        Self {
            pending: get(CrawlStatus::Pending),
            in_progress: get(CrawlStatus::InProgress),
            complete: get(CrawlStatus::Complete),
            failed: get(CrawlStatus::Failed),
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.complete + self.failed
    }
}

/// Priority queue of crawl jobs with bounded retry
pub struct CrawlQueue {
    store: Arc<dyn Store>,
    max_attempts: u32,
}

impl CrawlQueue {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_max_attempts(store, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(store: Arc<dyn Store>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Add a job for `url`
    pub async fn enqueue(
        &self,
        url: &str,
        site_id: Option<RecordId>,
        priority: i32,
    ) -> Result<CrawlJob> {
        let mut job = CrawlJob::new(url, site_id, priority);
        job.max_attempts = self.max_attempts;
        self.store
            .insert_job(&job)
            .await
            .with_context(|| format!("Failed to enqueue {}", url))?;
        tracing::debug!(job_id = %job.id, url, priority, "job enqueued");
        Ok(job)
    }

    /// Claim the next eligible job, if any
    pub async fn claim_next(&self) -> Result<Option<CrawlJob>> {
        let job = self.store.claim_next_job(Utc::now()).await?;
        if let Some(ref job) = job {
            tracing::debug!(
                job_id = %job.id,
                url = %job.url,
                attempt = job.attempts,
                "job claimed"
            );
        }
        Ok(job)
    }

    /// Record the outcome of a claimed job.
    ///
    /// `Failed` with attempts left returns the job to `pending`; at the cap
    /// it stays `failed` and is never claimed again.
    pub async fn complete(
        &self,
        job_id: &str,
        status: CrawlStatus,
        error: Option<String>,
    ) -> Result<CrawlJob> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .with_context(|| format!("Job {} not found", job_id))?;

        let now = Utc::now();
        job.updated_at = now;
        if error.is_some() {
            job.last_error = error;
        }

        match status {
            CrawlStatus::Failed if job.attempts < job.max_attempts => {
                job.status = CrawlStatus::Pending;
                tracing::info!(
                    job_id,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    "job failed, requeued"
                );
            }
            CrawlStatus::Failed => {
                job.status = CrawlStatus::Failed;
                job.completed_at = Some(now);
                tracing::warn!(job_id, attempts = job.attempts, "job permanently failed");
            }
            CrawlStatus::Complete => {
                job.status = CrawlStatus::Complete;
                job.completed_at = Some(now);
            }
            other => {
                job.status = other;
            }
        }

        self.store.update_job(&job).await?;
        Ok(job)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let counts = self.store.job_counts().await?;
        Ok(QueueStats::from_counts(&counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn queue() -> CrawlQueue {
        CrawlQueue::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_priority_then_age() {
        let q = queue();
        let low = q.enqueue("https://a.com/", None, 5).await.unwrap();
        let high = q.enqueue("https://b.com/", None, 1).await.unwrap();

        let first = q.claim_next().await.unwrap().unwrap();
        assert_eq!(first.id, high.id);
        assert_eq!(first.status, CrawlStatus::InProgress);
        assert_eq!(first.attempts, 1);

        let second = q.claim_next().await.unwrap().unwrap();
        assert_eq!(second.id, low.id);
        assert!(q.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_job_is_retried_until_cap() {
        let q = queue();
        let job = q.enqueue("https://flaky.example/", None, 0).await.unwrap();

        for attempt in 1..=3 {
            let claimed = q.claim_next().await.unwrap().unwrap();
            assert_eq!(claimed.id, job.id);
            assert_eq!(claimed.attempts, attempt);
            let after = q
                .complete(&job.id, CrawlStatus::Failed, Some("timeout".into()))
                .await
                .unwrap();
            if attempt < 3 {
                assert_eq!(after.status, CrawlStatus::Pending);
            } else {
                assert_eq!(after.status, CrawlStatus::Failed);
            }
        }

        // Three failures exhaust the default cap
        assert!(q.claim_next().await.unwrap().is_none());
        let stats = q.stats().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_complete_records_outcome() {
        let q = queue();
        let job = q.enqueue("https://ok.example/", None, 0).await.unwrap();
        q.claim_next().await.unwrap();
        let done = q.complete(&job.id, CrawlStatus::Complete, None).await.unwrap();
        assert_eq!(done.status, CrawlStatus::Complete);
        assert!(done.completed_at.is_some());

        let stats = q.stats().await.unwrap();
        assert_eq!(stats.complete, 1);
        assert_eq!(stats.total(), 1);
    }

    #[tokio::test]
    async fn test_complete_unknown_job_errors() {
        let q = queue();
        assert!(q.complete("nope", CrawlStatus::Complete, None).await.is_err());
    }
}
