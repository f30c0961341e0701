//! Stage 2: scan top developers and organizations for candidate repositories

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;

use super::host::{CodeHostError, RepoSummary};
use super::DiscoveryPipeline;
use crate::types::{Developer, Organization, Repository};

/// Provenance tag for repositories owned by a developer
pub fn developer_provenance(user: &str) -> String {
    format!("developer:{}", user)
}

/// Provenance tag for repositories owned by an organization
pub fn org_provenance(org: &str) -> String {
    format!("org:{}", org)
}

/// Provenance tag for repositories starred by a developer
pub fn starred_provenance(user: &str) -> String {
    format!("starred:{}", user)
}

/// Outcome of the developer and organization scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub developers_scanned: usize,
    pub orgs_scanned: usize,
    /// Repositories seen in listings
    pub repositories_found: usize,
    /// Repositories not previously stored
    pub repositories_added: usize,
    pub starred_skipped: usize,
    pub errors: Vec<String>,
}

struct DeveloperListing {
    developer: Developer,
    repos: Result<Vec<RepoSummary>, CodeHostError>,
    orgs: Result<Vec<String>, CodeHostError>,
    starred: Result<Vec<RepoSummary>, CodeHostError>,
}

impl DiscoveryPipeline {
    /// Scan the top developers' own, organization and starred repositories,
    /// plus the well-known organizations, and store every new candidate.
    pub async fn scan_developers(&self) -> Result<ScanResult> {
        let mut result = ScanResult::default();
        let developers = self.store.top_developers(self.config.top_developers).await?;

        let max_starred = self.config.max_starred_per_developer;
        let listings: Vec<DeveloperListing> = stream::iter(developers.into_iter().map(|developer| {
            let host = self.host.clone();
            async move {
                let user = developer.username.clone();
                DeveloperListing {
                    repos: host.user_repositories(&user).await,
                    orgs: host.user_organizations(&user).await,
                    starred: host.starred_repositories(&user, max_starred).await,
                    developer,
                }
            }
        }))
        .buffer_unordered(self.concurrency())
        .collect()
        .await;

        // org name -> developer it was found through
        let mut orgs: BTreeMap<String, Option<String>> = BTreeMap::new();

        for listing in listings {
            let mut developer = listing.developer;
            let user = developer.username.clone();
            let mut added = 0u32;

            match listing.repos {
                Ok(repos) => {
                    added += self.store_repositories(&repos, &developer_provenance(&user), &mut result).await;
                }
                Err(e) => result.errors.push(format!("repositories of {}: {}", user, e)),
            }

            match listing.orgs {
                Ok(names) => {
                    let capped: Vec<String> = names
                        .into_iter()
                        .take(self.config.max_orgs_per_developer)
                        .collect();
                    developer.orgs_discovered = capped.len() as u32;
                    for name in capped {
                        orgs.entry(name).or_insert_with(|| Some(user.clone()));
                    }
                }
                Err(e) => result.errors.push(format!("organizations of {}: {}", user, e)),
            }

            match listing.starred {
                Ok(starred) => {
                    let (relevant, skipped): (Vec<RepoSummary>, Vec<RepoSummary>) = starred
                        .into_iter()
                        .partition(|r| self.is_relevant_name(r.name()));
                    result.starred_skipped += skipped.len();
                    added += self
                        .store_repositories(&relevant, &starred_provenance(&user), &mut result)
                        .await;
                }
                Err(e) => result.errors.push(format!("starred of {}: {}", user, e)),
            }

            developer.repos_discovered = added;
            developer.last_scanned_at = Some(Utc::now());
            if let Err(e) = self.store.upsert_developer(&developer).await {
                result.errors.push(format!("developer {}: {:#}", user, e));
            }
            result.developers_scanned += 1;
        }

        for name in &self.config.well_known_orgs {
            orgs.entry(name.clone()).or_insert(None);
        }
        self.scan_organizations(orgs, &mut result).await;

        tracing::info!(
            developers = result.developers_scanned,
            orgs = result.orgs_scanned,
            found = result.repositories_found,
            added = result.repositories_added,
            errors = result.errors.len(),
            "developer scan finished"
        );
        Ok(result)
    }

    async fn scan_organizations(
        &self,
        orgs: BTreeMap<String, Option<String>>,
        result: &mut ScanResult,
    ) {
        let listings: Vec<_> = stream::iter(orgs.into_iter().map(|(name, via)| {
            let host = self.host.clone();
            async move {
                let repos = host.org_repositories(&name).await;
                (name, via, repos)
            }
        }))
        .buffer_unordered(self.concurrency())
        .collect()
        .await;

        for (name, via, repos) in listings {
            let repos = match repos {
                Ok(r) => r,
                Err(e) => {
                    result.errors.push(format!("repositories of org {}: {}", name, e));
                    continue;
                }
            };
            self.store_repositories(&repos, &org_provenance(&name), result).await;

            let mut org = Organization::new(&name, via);
            org.repo_count = repos.len() as u32;
            org.last_scanned_at = Some(Utc::now());
            if let Err(e) = self.store.upsert_organization(&org).await {
                result.errors.push(format!("organization {}: {:#}", name, e));
            }
            result.orgs_scanned += 1;
        }
    }

    /// Insert repositories not seen before; returns how many were new
    async fn store_repositories(
        &self,
        repos: &[RepoSummary],
        provenance: &str,
        result: &mut ScanResult,
    ) -> u32 {
        let mut added = 0;
        for summary in repos {
            result.repositories_found += 1;
            let repo = Repository::new(&summary.full_name, &summary.default_branch, provenance);
            match self.store.insert_repository(&repo).await {
                Ok(true) => {
                    added += 1;
                    result.repositories_added += 1;
                }
                Ok(false) => {}
                Err(e) => result.errors.push(format!("repository {}: {:#}", summary.full_name, e)),
            }
        }
        added
    }

    /// Whether a repository name contains one of the starred keywords
    pub fn is_relevant_name(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.config
            .starred_keywords
            .iter()
            .any(|k| name.contains(&k.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::store::{MemoryStore, Store};
    use crate::testing::StaticCodeHost;
    use std::sync::Arc;

    async fn pipeline(host: Arc<StaticCodeHost>) -> (DiscoveryPipeline, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.upsert_developer(&Developer::new("alice", 150, vec![])).await.unwrap();
        store.upsert_developer(&Developer::new("bob", 5, vec![])).await.unwrap();
        let config = DiscoveryConfig {
            top_developers: 1,
            max_orgs_per_developer: 1,
            well_known_orgs: vec!["hlxsites".into()],
            ..Default::default()
        };
        (DiscoveryPipeline::new(host, store.clone(), config), store)
    }

    #[tokio::test]
    async fn test_scan_tags_provenance() {
        let host = Arc::new(StaticCodeHost::new());
        host.add_user_repo("alice", RepoSummary::new("alice/site", "main"));
        host.add_user_org("alice", "acme");
        host.add_user_org("alice", "second-org");
        host.add_org_repo("acme", RepoSummary::new("acme/website", "main"));
        host.add_org_repo("second-org", RepoSummary::new("second-org/ignored", "main"));
        host.add_org_repo("hlxsites", RepoSummary::new("hlxsites/demo", "main"));
        host.add_starred("alice", RepoSummary::new("other/aem-demo", "main"));
        host.add_starred("alice", RepoSummary::new("other/dotfiles", "main"));
        host.add_user_repo("bob", RepoSummary::new("bob/never-scanned", "main"));

        let (pipeline, store) = pipeline(host).await;
        let result = pipeline.scan_developers().await.unwrap();

        assert_eq!(result.developers_scanned, 1);
        assert_eq!(result.orgs_scanned, 2);
        assert_eq!(result.starred_skipped, 1);
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let provenance = |name: &str| {
            let store = store.clone();
            let name = name.to_string();
            async move { store.get_repository(&name).await.unwrap().map(|r| r.provenance) }
        };
        assert_eq!(provenance("alice/site").await.as_deref(), Some("developer:alice"));
        assert_eq!(provenance("acme/website").await.as_deref(), Some("org:acme"));
        assert_eq!(provenance("hlxsites/demo").await.as_deref(), Some("org:hlxsites"));
        assert_eq!(provenance("other/aem-demo").await.as_deref(), Some("starred:alice"));
        assert_eq!(provenance("other/dotfiles").await, None);
        assert_eq!(provenance("second-org/ignored").await, None);
        assert_eq!(provenance("bob/never-scanned").await, None);

        let alice = store.get_developer("alice").await.unwrap().unwrap();
        assert!(alice.last_scanned_at.is_some());
        assert_eq!(alice.repos_discovered, 2);
        assert_eq!(alice.orgs_discovered, 1);

        let acme = store.get_organization("acme").await.unwrap().unwrap();
        assert_eq!(acme.discovered_via.as_deref(), Some("alice"));
        assert_eq!(acme.repo_count, 1);
    }

    #[tokio::test]
    async fn test_existing_repositories_are_not_duplicated() {
        let host = Arc::new(StaticCodeHost::new());
        host.add_user_repo("alice", RepoSummary::new("alice/site", "main"));
        let (pipeline, _) = pipeline(host).await;

        let first = pipeline.scan_developers().await.unwrap();
        let second = pipeline.scan_developers().await.unwrap();
        assert_eq!(first.repositories_added, 1);
        assert_eq!(second.repositories_added, 0);
        assert_eq!(second.repositories_found, 1);
    }
}
