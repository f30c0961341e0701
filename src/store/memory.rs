//! In-memory [`Store`] implementation.
//!
//! All tables live behind one `parking_lot::Mutex`, which makes every
//! operation (including the job claim) a single critical section. The state
//! can be saved to and reloaded from a JSON snapshot so separate command
//! invocations share records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{
    Block, CrawlJob, CrawlStatus, DesignSystem, Developer, Organization, Page, RecordId,
    Repository, Site,
};

use super::Store;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    /// Keyed by username
    developers: HashMap<String, Developer>,
    /// Keyed by name
    organizations: HashMap<String, Organization>,
    /// Keyed by full name
    repositories: HashMap<String, Repository>,
    sites: HashMap<RecordId, Site>,
    pages: HashMap<RecordId, Page>,
    blocks: HashMap<RecordId, Block>,
    /// Keyed by site id
    design_systems: HashMap<RecordId, DesignSystem>,
    jobs: HashMap<RecordId, CrawlJob>,
}

/// In-memory relational store with optional snapshot file.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a snapshot file, loading it if present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store snapshot {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store snapshot {:?}", path))?
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Write the snapshot file (no-op for a purely in-memory store).
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let encoded = {
            let tables = self.tables.lock();
            serde_json::to_vec_pretty(&*tables).context("Failed to encode store snapshot")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded).with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
        debug!("Saved store snapshot to {:?}", path);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_developer(&self, developer: &Developer) -> Result<Developer> {
        let mut tables = self.tables.lock();
        let stored = match tables.developers.get(&developer.username) {
            Some(existing) => Developer {
                id: existing.id.clone(),
                created_at: existing.created_at,
                ..developer.clone()
            },
            None => developer.clone(),
        };
        tables
            .developers
            .insert(stored.username.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_developer(&self, username: &str) -> Result<Option<Developer>> {
        Ok(self.tables.lock().developers.get(username).cloned())
    }

    async fn top_developers(&self, limit: usize) -> Result<Vec<Developer>> {
        let tables = self.tables.lock();
        let mut developers: Vec<Developer> = tables.developers.values().cloned().collect();
        developers.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.contributions.cmp(&a.contributions))
                .then_with(|| a.username.cmp(&b.username))
        });
        developers.truncate(limit);
        Ok(developers)
    }

    async fn upsert_organization(&self, org: &Organization) -> Result<Organization> {
        let mut tables = self.tables.lock();
        let stored = match tables.organizations.get(&org.name) {
            Some(existing) => Organization {
                id: existing.id.clone(),
                discovered_via: org
                    .discovered_via
                    .clone()
                    .or_else(|| existing.discovered_via.clone()),
                ..org.clone()
            },
            None => org.clone(),
        };
        tables.organizations.insert(stored.name.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_organization(&self, name: &str) -> Result<Option<Organization>> {
        Ok(self.tables.lock().organizations.get(name).cloned())
    }

    async fn insert_repository(&self, repo: &Repository) -> Result<bool> {
        let mut tables = self.tables.lock();
        if tables.repositories.contains_key(&repo.full_name) {
            return Ok(false);
        }
        tables.repositories.insert(repo.full_name.clone(), repo.clone());
        Ok(true)
    }

    async fn update_repository(&self, repo: &Repository) -> Result<()> {
        let mut tables = self.tables.lock();
        match tables.repositories.get_mut(&repo.full_name) {
            Some(existing) => {
                *existing = Repository {
                    id: existing.id.clone(),
                    created_at: existing.created_at,
                    ..repo.clone()
                };
                Ok(())
            }
            None => anyhow::bail!("Repository {} not found", repo.full_name),
        }
    }

    async fn get_repository(&self, full_name: &str) -> Result<Option<Repository>> {
        Ok(self.tables.lock().repositories.get(full_name).cloned())
    }

    async fn unscanned_repositories(&self, limit: usize) -> Result<Vec<Repository>> {
        let tables = self.tables.lock();
        let mut repos: Vec<Repository> = tables
            .repositories
            .values()
            .filter(|r| r.last_scanned_at.is_none())
            .cloned()
            .collect();
        repos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        repos.truncate(limit);
        Ok(repos)
    }

    async fn upsert_site(&self, site: &Site) -> Result<Site> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.sites.values_mut().find(|s| s.domain == site.domain) {
            if existing.repository_id.is_none() && site.repository_id.is_some() {
                existing.repository_id = site.repository_id.clone();
                existing.updated_at = Utc::now();
            }
            return Ok(existing.clone());
        }
        tables.sites.insert(site.id.clone(), site.clone());
        Ok(site.clone())
    }

    async fn get_site(&self, id: &str) -> Result<Option<Site>> {
        Ok(self.tables.lock().sites.get(id).cloned())
    }

    async fn get_site_by_domain(&self, domain: &str) -> Result<Option<Site>> {
        Ok(self
            .tables
            .lock()
            .sites
            .values()
            .find(|s| s.domain == domain)
            .cloned())
    }

    async fn update_site(&self, site: &Site) -> Result<()> {
        let mut tables = self.tables.lock();
        match tables.sites.get_mut(&site.id) {
            Some(existing) => {
                *existing = site.clone();
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => anyhow::bail!("Site {} not found", site.id),
        }
    }

    async fn upsert_page(&self, page: &Page) -> Result<Page> {
        let mut tables = self.tables.lock();
        let existing_id = tables
            .pages
            .values()
            .find(|p| p.site_id == page.site_id && p.path == page.path)
            .map(|p| p.id.clone());

        let stored = match existing_id {
            Some(id) => {
                tables.pages.remove(&id);
                Page { id, ..page.clone() }
            }
            None => page.clone(),
        };
        tables.pages.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn list_pages(&self, site_id: &str) -> Result<Vec<Page>> {
        let tables = self.tables.lock();
        let mut pages: Vec<Page> = tables
            .pages
            .values()
            .filter(|p| p.site_id == site_id)
            .cloned()
            .collect();
        pages.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(pages)
    }

    async fn count_pages(&self, site_id: &str) -> Result<usize> {
        Ok(self
            .tables
            .lock()
            .pages
            .values()
            .filter(|p| p.site_id == site_id)
            .count())
    }

    async fn upsert_block(&self, block: &Block) -> Result<Block> {
        let mut tables = self.tables.lock();
        let origin = block.bbox.origin_key();
        let existing = tables
            .blocks
            .values()
            .find(|b| b.page_id == block.page_id && b.name == block.name && b.bbox.origin_key() == origin);

        let stored = match existing {
            Some(prev) => {
                let mut merged = Block {
                    id: prev.id.clone(),
                    created_at: prev.created_at,
                    updated_at: Utc::now(),
                    ..block.clone()
                };
                // Scores stay valid while the scored markup is unchanged
                if block.quality_score.is_none()
                    && prev.raw_html == block.raw_html
                    && prev.interactivity == block.interactivity
                {
                    merged.quality_score = prev.quality_score;
                    merged.quality_tier = prev.quality_tier;
                    merged.quality_breakdown = prev.quality_breakdown.clone();
                }
                merged
            }
            None => block.clone(),
        };
        tables.blocks.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn list_blocks(&self, site_id: &str) -> Result<Vec<Block>> {
        let tables = self.tables.lock();
        let mut blocks: Vec<Block> = tables
            .blocks
            .values()
            .filter(|b| b.site_id == site_id)
            .cloned()
            .collect();
        blocks.sort_by(|a, b| {
            a.page_id
                .cmp(&b.page_id)
                .then_with(|| a.bbox.y.total_cmp(&b.bbox.y))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(blocks)
    }

    async fn update_block(&self, block: &Block) -> Result<()> {
        let mut tables = self.tables.lock();
        match tables.blocks.get_mut(&block.id) {
            Some(existing) => {
                *existing = block.clone();
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => anyhow::bail!("Block {} not found", block.id),
        }
    }

    async fn delete_blocks(&self, ids: &[RecordId]) -> Result<usize> {
        let mut tables = self.tables.lock();
        Ok(ids
            .iter()
            .filter(|id| tables.blocks.remove(id.as_str()).is_some())
            .count())
    }

    async fn count_blocks(&self, site_id: &str) -> Result<usize> {
        Ok(self
            .tables
            .lock()
            .blocks
            .values()
            .filter(|b| b.site_id == site_id)
            .count())
    }

    async fn upsert_design_system(&self, design: &DesignSystem) -> Result<DesignSystem> {
        let mut tables = self.tables.lock();
        let stored = match tables.design_systems.get(&design.site_id) {
            Some(existing) => DesignSystem {
                id: existing.id.clone(),
                ..design.clone()
            },
            None => design.clone(),
        };
        tables
            .design_systems
            .insert(stored.site_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_design_system(&self, site_id: &str) -> Result<Option<DesignSystem>> {
        Ok(self.tables.lock().design_systems.get(site_id).cloned())
    }

    async fn insert_job(&self, job: &CrawlJob) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.jobs.contains_key(&job.id) {
            anyhow::bail!("Job {} already exists", job.id);
        }
        tables.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn claim_next_job(&self, now: DateTime<Utc>) -> Result<Option<CrawlJob>> {
        let mut tables = self.tables.lock();
        let next_id = tables
            .jobs
            .values()
            .filter(|j| j.is_claimable())
            .min_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| a.created_at.cmp(&b.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|j| j.id.clone());

        let Some(id) = next_id else {
            return Ok(None);
        };

        let job = tables
            .jobs
            .get_mut(&id)
            .context("claimed job vanished from table")?;
        job.status = CrawlStatus::InProgress;
        job.attempts += 1;
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn update_job(&self, job: &CrawlJob) -> Result<()> {
        let mut tables = self.tables.lock();
        match tables.jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => anyhow::bail!("Job {} not found", job.id),
        }
    }

    async fn get_job(&self, id: &str) -> Result<Option<CrawlJob>> {
        Ok(self.tables.lock().jobs.get(id).cloned())
    }

    async fn job_counts(&self) -> Result<HashMap<CrawlStatus, usize>> {
        let tables = self.tables.lock();
        let mut counts = HashMap::new();
        for job in tables.jobs.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentHash, TemplateType};
    use std::sync::Arc;

    fn page(site_id: &str, path: &str) -> Page {
        Page {
            id: crate::types::new_id(),
            site_id: site_id.to_string(),
            path: path.to_string(),
            url: format!("https://example.com{}", path),
            template: TemplateType::Generic,
            content_hash: ContentHash::compute(path),
            load_time_ms: 10,
            screenshot_key: None,
            metadata: serde_json::json!({}),
            crawled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_page_upsert_keeps_id() {
        let store = MemoryStore::new();
        let first = store.upsert_page(&page("s1", "/about")).await.unwrap();
        let second = store.upsert_page(&page("s1", "/about")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_pages("s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_site_upsert_by_domain() {
        let store = MemoryStore::new();
        let a = store.upsert_site(&Site::new("a.example", None)).await.unwrap();
        let b = store
            .upsert_site(&Site::new("a.example", Some("repo-1".to_string())))
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.repository_id.as_deref(), Some("repo-1"));
    }

    #[tokio::test]
    async fn test_repository_insert_is_conditional() {
        let store = MemoryStore::new();
        let repo = Repository::new("acme/site", "main", "org:acme");
        assert!(store.insert_repository(&repo).await.unwrap());
        assert!(!store.insert_repository(&repo).await.unwrap());
        assert_eq!(store.unscanned_repositories(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_orders_by_priority_then_age() {
        let store = MemoryStore::new();
        let mut low = CrawlJob::new("https://low.example/", None, 10);
        low.created_at = Utc::now() - chrono::Duration::seconds(60);
        let high = CrawlJob::new("https://high.example/", None, 1);
        store.insert_job(&low).await.unwrap();
        store.insert_job(&high).await.unwrap();

        let first = store.claim_next_job(Utc::now()).await.unwrap().unwrap();
        assert_eq!(first.id, high.id);
        assert_eq!(first.status, CrawlStatus::InProgress);
        assert_eq!(first.attempts, 1);

        let second = store.claim_next_job(Utc::now()).await.unwrap().unwrap();
        assert_eq!(second.id, low.id);
        assert!(store.claim_next_job(Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_share_a_job() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..20 {
            store
                .insert_job(&CrawlJob::new(format!("https://s{}.example/", i), None, 5))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = store.claim_next_job(Utc::now()).await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), 20);
        assert_eq!(unique.len(), 20);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::open(&path).unwrap();
        store.upsert_site(&Site::new("persisted.example", None)).await.unwrap();
        store.save().unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        assert!(reopened
            .get_site_by_domain("persisted.example")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_top_developers_by_priority() {
        let store = MemoryStore::new();
        store.upsert_developer(&Developer::new("casual", 5, vec![])).await.unwrap();
        store.upsert_developer(&Developer::new("core", 500, vec![])).await.unwrap();
        store.upsert_developer(&Developer::new("regular", 50, vec![])).await.unwrap();

        let top = store.top_developers(2).await.unwrap();
        let names: Vec<_> = top.iter().map(|d| d.username.as_str()).collect();
        assert_eq!(names, vec!["core", "regular"]);
    }
}
