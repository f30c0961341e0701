//! Persistence collaborators
//!
//! The pipeline talks to two stores:
//! - [`Store`]: relational records (developers through crawl jobs) with
//!   conditional upserts, an atomic job claim, and simple aggregates
//! - [`BlobStore`]: raw bytes under a fixed key layout (page HTML, block HTML,
//!   screenshots)
//!
//! Both are async traits so a networked backend can slot in. The crate ships
//! an in-memory relational store (with JSON snapshots) and sled / in-memory
//! blob stores.

mod blob;
mod memory;

pub use blob::{MemoryBlobStore, SledBlobStore};
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::{
    Block, CrawlJob, CrawlStatus, DesignSystem, Developer, Organization, Page, RecordId,
    Repository, Site,
};

/// Blob key for the raw HTML of a crawled page
pub fn page_html_key(site_id: &str, page_id: &str) -> String {
    format!("pages/{}/{}/html", site_id, page_id)
}

/// Blob key for the screenshot of a crawled page
pub fn page_screenshot_key(site_id: &str, page_id: &str) -> String {
    format!("pages/{}/{}/screenshot", site_id, page_id)
}

/// Blob key for the HTML of an extracted block
pub fn block_html_key(site_id: &str, block_id: &str) -> String {
    format!("blocks/{}/{}/html", site_id, block_id)
}

/// Blob key for the JSON metadata of an extracted block
pub fn block_metadata_key(site_id: &str, block_id: &str) -> String {
    format!("blocks/{}/{}/metadata", site_id, block_id)
}

/// Relational store for all corpus records.
///
/// Upserts are keyed as follows:
///
/// | Record | Conflict key |
/// |--------|--------------|
/// | Developer | username |
/// | Organization | name |
/// | Repository | full name |
/// | Site | domain |
/// | Page | (site, path) |
/// | Block | (page, name, bounding-box origin) |
/// | DesignSystem | site |
///
/// On conflict the existing record id is kept and returned.
#[async_trait]
pub trait Store: Send + Sync {
    // --- developers -------------------------------------------------------

    /// Insert or update a developer by username.
    async fn upsert_developer(&self, developer: &Developer) -> Result<Developer>;

    async fn get_developer(&self, username: &str) -> Result<Option<Developer>>;

    /// Developers ordered by priority (high first), then contributions descending.
    async fn top_developers(&self, limit: usize) -> Result<Vec<Developer>>;

    // --- organizations ----------------------------------------------------

    /// Insert or update an organization by name.
    async fn upsert_organization(&self, org: &Organization) -> Result<Organization>;

    async fn get_organization(&self, name: &str) -> Result<Option<Organization>>;

    // --- repositories -----------------------------------------------------

    /// Insert a repository unless one with the same full name exists.
    ///
    /// Returns `true` when a new row was inserted.
    async fn insert_repository(&self, repo: &Repository) -> Result<bool>;

    /// Overwrite an existing repository (matched by full name).
    async fn update_repository(&self, repo: &Repository) -> Result<()>;

    async fn get_repository(&self, full_name: &str) -> Result<Option<Repository>>;

    /// Repositories never verified, oldest first.
    async fn unscanned_repositories(&self, limit: usize) -> Result<Vec<Repository>>;

    // --- sites ------------------------------------------------------------

    /// Insert a site or, on domain conflict, return the existing one
    /// (binding the repository if it had none).
    async fn upsert_site(&self, site: &Site) -> Result<Site>;

    async fn get_site(&self, id: &str) -> Result<Option<Site>>;

    async fn get_site_by_domain(&self, domain: &str) -> Result<Option<Site>>;

    async fn update_site(&self, site: &Site) -> Result<()>;

    // --- pages ------------------------------------------------------------

    /// Insert or update a page by (site, path).
    async fn upsert_page(&self, page: &Page) -> Result<Page>;

    async fn list_pages(&self, site_id: &str) -> Result<Vec<Page>>;

    async fn count_pages(&self, site_id: &str) -> Result<usize>;

    // --- blocks -----------------------------------------------------------

    /// Insert or update a block by (page, name, bounding-box origin).
    async fn upsert_block(&self, block: &Block) -> Result<Block>;

    async fn list_blocks(&self, site_id: &str) -> Result<Vec<Block>>;

    async fn update_block(&self, block: &Block) -> Result<()>;

    /// Delete blocks by id, returning how many existed.
    async fn delete_blocks(&self, ids: &[RecordId]) -> Result<usize>;

    async fn count_blocks(&self, site_id: &str) -> Result<usize>;

    // --- design systems ---------------------------------------------------

    async fn upsert_design_system(&self, design: &DesignSystem) -> Result<DesignSystem>;

    async fn get_design_system(&self, site_id: &str) -> Result<Option<DesignSystem>>;

    // --- crawl jobs -------------------------------------------------------

    async fn insert_job(&self, job: &CrawlJob) -> Result<()>;

    /// Atomically claim the next pending job.
    ///
    /// Picks the lowest priority number, then the oldest, among `pending`
    /// jobs with `attempts < max_attempts`; flips it to `in_progress` and
    /// increments `attempts` in the same step.
    async fn claim_next_job(&self, now: DateTime<Utc>) -> Result<Option<CrawlJob>>;

    async fn update_job(&self, job: &CrawlJob) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Option<CrawlJob>>;

    /// Number of jobs per status.
    async fn job_counts(&self) -> Result<HashMap<CrawlStatus, usize>>;
}

/// Key/value blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a blob, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Keys starting with `prefix`, in lexicographic order.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
