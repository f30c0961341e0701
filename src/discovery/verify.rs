//! Stage 3: structural and live verification of candidate repositories
//!
//! Structural markers are probed through the code host. A confirmed
//! repository can be re-checked against its preview deployment; a site is
//! then created for it and its crawl enqueued.

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::host::CodeHost;
use super::DiscoveryPipeline;
use crate::scraping::{preview_url, FetchResult, PageFetcher};
use crate::types::{Repository, Site};

/// Path of the platform's core page script
pub const CORE_SCRIPT: &str = "scripts/aem.js";

/// Structural markers and their confidence weights
pub const MARKERS: &[(&str, u8)] = &[
    (CORE_SCRIPT, 40),
    ("blocks", 25),
    ("fstab.yaml", 15),
    (".helix", 15),
    ("scripts", 10),
    ("styles", 10),
];

/// Live confidence at or above this counts as confirmed
pub const LIVE_CONFIRM_THRESHOLD: u8 = 50;

/// Priority given to crawl jobs of newly verified sites
pub const VERIFIED_SITE_PRIORITY: i32 = 10;

static RE_SECTION: OnceLock<Regex> = OnceLock::new();
static RE_WRAPPER: OnceLock<Regex> = OnceLock::new();

/// Structural verdict for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralCheck {
    pub markers: Vec<String>,
    pub confidence: u8,
    pub confirmed: bool,
}

impl StructuralCheck {
    /// Weighted confidence of the markers found, capped at 100.
    ///
    /// Confirmed when the core script is present, or when `blocks` sits
    /// next to `fstab.yaml` or `.helix`.
    pub fn from_markers(found: &[&str]) -> Self {
        let total: u32 = MARKERS
            .iter()
            .filter(|(path, _)| found.contains(path))
            .map(|(_, weight)| u32::from(*weight))
            .sum();
        let has = |path: &str| found.contains(&path);
        let confirmed = has(CORE_SCRIPT) || (has("blocks") && (has("fstab.yaml") || has(".helix")));

        Self {
            markers: found.iter().map(|m| m.to_string()).collect(),
            confidence: total.min(100) as u8,
            confirmed,
        }
    }
}

/// Verdict of the live preview check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCheck {
    pub url: String,
    pub signals: Vec<&'static str>,
    pub confidence: u8,
    pub confirmed: bool,
}

impl LiveCheck {
    /// Score a fetched preview page.
    ///
    /// | Signal | Weight |
    /// |--------|--------|
    /// | analytics (RUM) snippet | 20 |
    /// | core script reference | 30 |
    /// | section class | 20 |
    /// | block wrapper class | 15 |
    /// | platform response headers | 15 |
    pub fn from_response(url: &str, response: &FetchResult) -> Self {
        let body = &response.body;
        let mut signals = Vec::new();
        let mut confidence = 0u32;

        let mut signal = |name: &'static str, weight: u32, present: bool| {
            if present {
                signals.push(name);
                confidence += weight;
            }
        };

        signal(
            "rum",
            20,
            body.contains("sampleRUM") || body.contains("/.rum/") || body.contains("rum-standalone"),
        );
        signal(
            "core-script",
            30,
            body.contains("aem.js") || body.contains("lib-franklin.js"),
        );
        let re_section = RE_SECTION.get_or_init(|| Regex::new(r#"class="section[\s"]"#).unwrap());
        signal("section-class", 20, re_section.is_match(body));
        let re_wrapper =
            RE_WRAPPER.get_or_init(|| Regex::new(r#"class="[a-z][a-z0-9-]*-wrapper[\s"]"#).unwrap());
        signal("block-wrapper", 15, re_wrapper.is_match(body));
        signal(
            "headers",
            15,
            response.headers.iter().any(|(name, _)| {
                let name = name.to_ascii_lowercase();
                name.starts_with("x-aem") || name.starts_with("x-helix")
            }),
        );

        let confidence = confidence.min(100) as u8;
        Self {
            url: url.to_string(),
            signals,
            confidence,
            confirmed: response.is_success() && confidence >= LIVE_CONFIRM_THRESHOLD,
        }
    }
}

/// Outcome of verifying a batch of repositories
#[derive(Debug, Clone, Default)]
pub struct VerifyResult {
    pub repositories_checked: usize,
    pub repositories_confirmed: usize,
    pub live_confirmed: usize,
    pub sites_created: usize,
    pub jobs_enqueued: usize,
    pub errors: Vec<String>,
}

struct Probe {
    repo: Repository,
    structural: Result<StructuralCheck, String>,
    live: Option<Result<LiveCheck, String>>,
}

/// Probe every marker path of a repository at its default branch
pub async fn check_structure(host: &dyn CodeHost, repo: &Repository) -> Result<StructuralCheck, String> {
    let mut found = Vec::new();
    for (path, _) in MARKERS {
        match host.path_exists(&repo.full_name, &repo.default_branch, path).await {
            Ok(true) => found.push(*path),
            Ok(false) => {}
            Err(e) => return Err(format!("probe {} in {}: {}", path, repo.full_name, e)),
        }
    }
    Ok(StructuralCheck::from_markers(&found))
}

/// Fetch and score the repository's canonical preview URL
pub async fn check_live(fetcher: &dyn PageFetcher, repo: &Repository) -> Result<LiveCheck, String> {
    let (owner, name) = repo
        .owner_and_name()
        .ok_or_else(|| format!("malformed repository name {}", repo.full_name))?;
    let url = preview_url(owner, name, &repo.default_branch);
    let parsed = Url::parse(&url).map_err(|e| format!("{}: {}", url, e))?;
    let response = fetcher
        .fetch(&parsed)
        .await
        .map_err(|e| format!("live check {}: {}", url, e))?;
    Ok(LiveCheck::from_response(&url, &response))
}

impl DiscoveryPipeline {
    /// Verify up to the configured batch of unscanned repositories.
    ///
    /// A repository whose probes fail is left unscanned for the next run.
    pub async fn verify_repositories(&self) -> Result<VerifyResult> {
        let mut result = VerifyResult::default();
        let pending = self
            .store
            .unscanned_repositories(self.config.verify_batch_size)
            .await?;

        let live_fetcher = if self.config.check_live_urls {
            self.fetcher.clone()
        } else {
            None
        };

        let probes: Vec<Probe> = stream::iter(pending.into_iter().map(|repo| {
            let host = self.host.clone();
            let fetcher = live_fetcher.clone();
            async move {
                let structural = check_structure(host.as_ref(), &repo).await;
                let live = match (&structural, fetcher) {
                    (Ok(check), Some(fetcher)) if check.confirmed => {
                        Some(check_live(fetcher.as_ref(), &repo).await)
                    }
                    _ => None,
                };
                Probe {
                    repo,
                    structural,
                    live,
                }
            }
        }))
        .buffer_unordered(self.concurrency())
        .collect()
        .await;

        for probe in probes {
            self.record_probe(probe, &mut result).await;
        }

        tracing::info!(
            checked = result.repositories_checked,
            confirmed = result.repositories_confirmed,
            live = result.live_confirmed,
            sites = result.sites_created,
            errors = result.errors.len(),
            "repository verification finished"
        );
        Ok(result)
    }

    async fn record_probe(&self, probe: Probe, result: &mut VerifyResult) {
        let mut repo = probe.repo;
        let structural = match probe.structural {
            Ok(check) => check,
            Err(e) => {
                result.errors.push(e);
                return;
            }
        };

        result.repositories_checked += 1;
        repo.eds_confidence = structural.confidence;
        repo.confirmed = structural.confirmed;
        repo.markers = structural.markers;
        repo.last_scanned_at = Some(Utc::now());

        let site_url = match probe.live {
            Some(Ok(live)) => {
                tracing::debug!(
                    repo = %repo.full_name,
                    confidence = live.confidence,
                    signals = ?live.signals,
                    "live check"
                );
                if live.confirmed {
                    result.live_confirmed += 1;
                    repo.live_url = Some(live.url.clone());
                    Some(live.url)
                } else {
                    None
                }
            }
            Some(Err(e)) => {
                result.errors.push(e);
                None
            }
            // Live checking disabled: trust the structural verdict
            None if structural.confirmed && !self.config.check_live_urls => repo
                .owner_and_name()
                .map(|(owner, name)| preview_url(owner, name, &repo.default_branch)),
            None => None,
        };

        if repo.confirmed {
            result.repositories_confirmed += 1;
        }

        if let Err(e) = self.store.update_repository(&repo).await {
            result.errors.push(format!("repository {}: {:#}", repo.full_name, e));
            return;
        }

        if let Some(url) = site_url {
            self.create_site(&repo, &url, result).await;
        }
    }

    async fn create_site(&self, repo: &Repository, url: &str, result: &mut VerifyResult) {
        let Some(domain) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) else {
            result.errors.push(format!("no host in {}", url));
            return;
        };

        let site = match self.store.upsert_site(&Site::new(domain, Some(repo.id.clone()))).await {
            Ok(site) => site,
            Err(e) => {
                result.errors.push(format!("site for {}: {:#}", repo.full_name, e));
                return;
            }
        };
        result.sites_created += 1;

        if let Some(queue) = &self.queue {
            match queue.enqueue(url, Some(site.id.clone()), VERIFIED_SITE_PRIORITY).await {
                Ok(_) => result.jobs_enqueued += 1,
                Err(e) => result.errors.push(format!("enqueue {}: {:#}", url, e)),
            }
        }
    }
}
