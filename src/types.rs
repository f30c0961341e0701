//! Core record types for the block corpus
//!
//! These are the persisted shapes handed to the relational store. JSON-valued
//! columns (tokens, content model, CSS variables, breakdowns, metadata) are
//! plain serde types so any backend can store them opaquely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::extraction::{ContentNode, DesignTokens, InteractivityFlags};
use crate::scoring::{QualityBreakdown, QualityTier};

/// Unique identifier for any stored record
pub type RecordId = String;

/// Generate a fresh record identifier
pub fn new_id() -> RecordId {
    uuid::Uuid::new_v4().to_string()
}

/// Exact content hash using SHA256 (64-character hex string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA256 hash of content
    pub fn compute(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        ContentHash(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Discovery records
// ============================================================================

/// Scan priority of a developer, derived from contribution volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeveloperPriority {
    Low,
    Medium,
    High,
}

impl DeveloperPriority {
    /// >100 contributions is high, >20 medium, anything else low
    pub fn from_contributions(total: u64) -> Self {
        if total > 100 {
            Self::High
        } else if total > 20 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for DeveloperPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contributor found on one of the seed repositories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub id: RecordId,
    /// Username on the code-hosting platform
    pub username: String,
    pub priority: DeveloperPriority,
    /// Total contributions across all seed repositories
    pub contributions: u64,
    /// Seed repositories the developer contributed to
    pub source_repos: Vec<String>,
    pub repos_discovered: u32,
    pub orgs_discovered: u32,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Developer {
    pub fn new(username: impl Into<String>, contributions: u64, source_repos: Vec<String>) -> Self {
        Self {
            id: new_id(),
            username: username.into(),
            priority: DeveloperPriority::from_contributions(contributions),
            contributions,
            source_repos,
            repos_discovered: 0,
            orgs_discovered: 0,
            last_scanned_at: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: RecordId,
    pub name: String,
    /// Username of the developer through which the org was found
    pub discovered_via: Option<String>,
    pub repo_count: u32,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl Organization {
    pub fn new(name: impl Into<String>, discovered_via: Option<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            discovered_via,
            repo_count: 0,
            last_scanned_at: None,
        }
    }
}

/// A candidate repository that may back a block-authored site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RecordId,
    /// `owner/name`
    pub full_name: String,
    pub default_branch: String,
    /// 0-100 structural confidence
    pub eds_confidence: u8,
    pub confirmed: bool,
    /// `developer:<user>`, `org:<name>` or `starred:<user>`
    pub provenance: String,
    pub live_url: Option<String>,
    /// Structural markers found during verification
    #[serde(default)]
    pub markers: Vec<String>,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(
        full_name: impl Into<String>,
        default_branch: impl Into<String>,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            full_name: full_name.into(),
            default_branch: default_branch.into(),
            eds_confidence: 0,
            confirmed: false,
            provenance: provenance.into(),
            live_url: None,
            markers: Vec::new(),
            last_scanned_at: None,
            created_at: Utc::now(),
        }
    }

    /// Split `owner/name`
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.full_name.split_once('/')
    }
}

// ============================================================================
// Crawl records
// ============================================================================

/// Lifecycle of a site crawl and of a queued crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: RecordId,
    /// Unique hostname
    pub domain: String,
    pub repository_id: Option<RecordId>,
    pub status: CrawlStatus,
    pub page_count: u32,
    pub block_count: u32,
    pub avg_quality_score: Option<f64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn new(domain: impl Into<String>, repository_id: Option<RecordId>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            domain: domain.into(),
            repository_id,
            status: CrawlStatus::Pending,
            page_count: 0,
            block_count: 0,
            avg_quality_score: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Template classification of a crawled page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Homepage,
    Article,
    Product,
    About,
    Contact,
    Landing,
    Generic,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Article => "article",
            Self::Product => "product",
            Self::About => "about",
            Self::Contact => "contact",
            Self::Landing => "landing",
            Self::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: RecordId,
    pub site_id: RecordId,
    /// Path component, unique within the site
    pub path: String,
    pub url: String,
    pub template: TemplateType,
    pub content_hash: ContentHash,
    pub load_time_ms: u64,
    pub screenshot_key: Option<String>,
    pub metadata: serde_json::Value,
    pub crawled_at: DateTime<Utc>,
}

// ============================================================================
// Block records
// ============================================================================

/// Position of a block on its page
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Origin used when no layout engine is available: the block's
    /// same-name ordinal on the y axis
    pub fn from_ordinal(ordinal: usize) -> Self {
        Self {
            x: 0.0,
            y: ordinal as f64,
            width: 0.0,
            height: 0.0,
        }
    }

    /// Origin as integer key for uniqueness checks
    pub fn origin_key(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: RecordId,
    pub page_id: RecordId,
    pub site_id: RecordId,
    pub name: String,
    pub variant: Option<String>,
    pub raw_html: String,
    pub clean_html: String,
    /// Blob key of the stored HTML copy
    pub html_key: Option<String>,
    pub bbox: BoundingBox,
    pub design_tokens: DesignTokens,
    pub content_model: Vec<ContentNode>,
    pub css_variables: BTreeMap<String, String>,
    pub quality_score: Option<u8>,
    pub quality_tier: Option<QualityTier>,
    pub quality_breakdown: Option<QualityBreakdown>,
    pub interactivity: InteractivityFlags,
    /// Which detector produced the record
    pub detector: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregated styling tokens for one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSystem {
    pub id: RecordId,
    pub site_id: RecordId,
    pub colors: Vec<String>,
    pub fonts: Vec<String>,
    pub spacing: Vec<String>,
    pub css_variables: BTreeMap<String, String>,
    pub block_count: u32,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Queue records
// ============================================================================

/// Default retry cap for a crawl job
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A queued unit of crawl work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: RecordId,
    pub url: String,
    pub site_id: Option<RecordId>,
    /// Lower number is served first
    pub priority: i32,
    pub status: CrawlStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CrawlJob {
    pub fn new(url: impl Into<String>, site_id: Option<RecordId>, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            url: url.into(),
            site_id,
            priority,
            status: CrawlStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether a claim may pick this job up
    pub fn is_claimable(&self) -> bool {
        self.status == CrawlStatus::Pending && self.attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_thresholds() {
        assert_eq!(DeveloperPriority::from_contributions(101), DeveloperPriority::High);
        assert_eq!(DeveloperPriority::from_contributions(100), DeveloperPriority::Medium);
        assert_eq!(DeveloperPriority::from_contributions(21), DeveloperPriority::Medium);
        assert_eq!(DeveloperPriority::from_contributions(20), DeveloperPriority::Low);
        assert!(DeveloperPriority::High > DeveloperPriority::Low);
    }

    #[test]
    fn test_content_hash_stable() {
        let a = ContentHash::compute("<main></main>");
        let b = ContentHash::compute("<main></main>");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_job_claimable() {
        let mut job = CrawlJob::new("https://example.com/", None, 5);
        assert!(job.is_claimable());
        job.attempts = job.max_attempts;
        assert!(!job.is_claimable());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&CrawlStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
